pub mod mailer;
pub mod smtp;
pub mod templates;

pub use mailer::{dispatch, LogMailer, MailError, Mailer};
pub use smtp::{SmtpCredentials, SmtpMailer};
pub use templates::{forgot_code_mail, verification_mail, MailContent};
