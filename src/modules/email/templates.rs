use std::time::Duration;

use crate::modules::utils::time::format_duration;

/// Subject and body of an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub subject: String,
    pub body: String,
}

pub const VERIFICATION_SUBJECT: &str = "verification mail";
pub const FORGOT_CODE_SUBJECT: &str = "change password";

// Message asking the user to open the verification link
pub fn verification_mail(verification_url: &str, ttl: Duration) -> MailContent {
    MailContent {
        subject: VERIFICATION_SUBJECT.to_string(),
        body: format!(
            "Please verify your email address by opening the link below:\n\
            \n\
            {}\n\
            \n\
            This link will expire in {}.",
            verification_url,
            format_duration(ttl.as_secs())
        ),
    }
}

// Message carrying a password reset code
pub fn forgot_code_mail(code: &str) -> MailContent {
    MailContent {
        subject: FORGOT_CODE_SUBJECT.to_string(),
        body: format!(
            "your code: {}\n\
            \n\
            If you did not request a password reset, please ignore this email.",
            code
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_mail_embeds_url() {
        let mail = verification_mail(
            "http://localhost:3000/api/v1/auth/verify?token=abc",
            Duration::from_secs(3600),
        );
        assert_eq!(mail.subject, "verification mail");
        assert!(mail
            .body
            .contains("http://localhost:3000/api/v1/auth/verify?token=abc"));
        assert!(mail.body.contains("1 hours"));
    }

    #[test]
    fn test_forgot_code_mail_embeds_code() {
        let mail = forgot_code_mail("123456");
        assert_eq!(mail.subject, "change password");
        assert!(mail.body.starts_with("your code: 123456"));
    }
}
