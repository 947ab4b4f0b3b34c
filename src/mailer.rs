use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Outbound email. Sends are best-effort: callers log failures and move on.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Writes each message to the log instead of talking to an SMTP relay.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if !self.from.contains('@') {
            return Err(MailError::Delivery(format!("sender {:?} is not an address", self.from)));
        }
        if !to.contains('@') {
            return Err(MailError::InvalidAddress(to.to_string()));
        }

        tracing::info!(from = %self.from, to = %to, subject = %subject, "Email queued");
        tracing::debug!("Email body for {}: {}", to, body);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_rejects_malformed_address() {
        let mailer = LogMailer::new("noreply@test.local");
        assert!(mailer.send("bob@example.com", "s", "b").await.is_ok());
        assert!(matches!(
            mailer.send("bob", "s", "b").await,
            Err(MailError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_log_mailer_with_bad_sender_fails_delivery() {
        let mailer = LogMailer::new("task-notify");
        assert!(matches!(
            mailer.send("bob@example.com", "s", "b").await,
            Err(MailError::Delivery(_))
        ));
    }
}
