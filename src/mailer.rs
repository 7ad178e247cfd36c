//! Outgoing mail.
//!
//! Messages are logged rather than delivered; there is no SMTP transport.

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn verification(to: &str, name: &str, link: &str) -> Self {
        Self::new(
            to,
            "Verify your Baby Kingdom account",
            format!("Hi {name},\n\nConfirm your email address: {link}\n\nThe link expires in 24 hours."),
        )
    }

    pub fn password_reset(to: &str, name: &str, link: &str) -> Self {
        Self::new(
            to,
            "Reset your Baby Kingdom password",
            format!("Hi {name},\n\nReset your password: {link}\n\nThe link expires in 1 hour."),
        )
    }
}

pub fn send(email: &Email) {
    tracing::info!(to = %email.to, subject = %email.subject, "email queued");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_mail_contains_link() {
        let mail = Email::verification("amy@example.com", "Amy", "https://shop/verify?token=t");
        assert_eq!(mail.to, "amy@example.com");
        assert!(mail.body.contains("https://shop/verify?token=t"));
        assert!(mail.body.starts_with("Hi Amy"));
    }
}
