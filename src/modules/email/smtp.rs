use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::PoolConfig;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

use super::mailer::{MailError, Mailer};

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP login and server
#[derive(Clone)]
pub struct SmtpCredentials {
    // account used to authenticate, also the sender address
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Delivers mail through an SMTP relay with required TLS.
///
/// The lettre transport is blocking, so each send runs on the blocking pool.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: String,
}

impl SmtpMailer {
    pub fn new(creds: &SmtpCredentials, sender_name: &str) -> Result<Self, MailError> {
        let tls_parameters = TlsParameters::builder(creds.host.clone())
            .build()
            .map_err(|e| MailError::Transport(format!("failed to build TLS parameters: {}", e)))?;

        let transport = SmtpTransport::relay(&creds.host)
            .map_err(|e| MailError::Transport(format!("failed to create SMTP transport: {}", e)))?
            .credentials(Credentials::new(creds.username.clone(), creds.password.clone()))
            .port(creds.port)
            .tls(Tls::Required(tls_parameters))
            .pool_config(PoolConfig::new().max_size(4))
            .timeout(Some(Duration::from_secs(10)))
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", sender_name, creds.username),
        })
    }
}

/// Build a plain-text message
pub fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
    Message::builder()
        .from(from
            .parse()
            .map_err(|_| MailError::InvalidAddress(from.to_string()))?)
        .to(to
            .parse()
            .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailError::Message(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = build_message(&self.from, to, subject, body)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Transport(format!("send task aborted: {}", e)))?
            .map(|_| ())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}
