use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::modules::utils::logging::format_sensitive;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outbound mail delivery.
///
/// Failures are reported to the dispatcher, which only logs them; the
/// account operations never see a mail error.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Mailer that writes messages to the log instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        log::info!("Mail to={} subject={:?}\n{}", to, subject, body);
        Ok(())
    }
}

/// Send a message on a detached task.
///
/// Returns immediately; the outcome is only logged. The handle is handed
/// back for callers that want to await delivery, such as tests or a
/// shutdown drain, and may simply be dropped.
pub fn dispatch<M>(mailer: Arc<M>, to: String, subject: String, body: String) -> JoinHandle<()>
where
    M: Mailer + ?Sized + 'static,
{
    tokio::spawn(async move {
        match mailer.send(&to, &subject, &body).await {
            Ok(()) => log::info!("Mail '{}' sent to {}", subject, format_sensitive(&to)),
            Err(e) => log::error!(
                "Mail '{}' to {} failed: {}",
                subject,
                format_sensitive(&to),
                e
            ),
        }
    })
}
