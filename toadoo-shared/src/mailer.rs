/// Outbound mail collaborator
///
/// The service never delivers real mail. [`LogMailer`] writes the would-be
/// message to the log (token shown as a short prefix only), and
/// [`RecordingMailer`] keeps messages in memory so tests can pick up the
/// plaintext tokens.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::auth::opaque::token_prefix;

/// Mail delivery failure
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// Sends account mails
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the email verification token
    async fn send_verification(&self, email: &str, token: &str) -> Result<(), MailError>;

    /// Sends the password reset token
    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError>;
}

/// Mailer that only logs
#[derive(Debug, Clone)]
pub struct LogMailer {
    enabled: bool,
    from: String,
}

impl LogMailer {
    /// `enabled = false` logs a single "disabled" line per message
    pub fn new(enabled: bool, from: impl Into<String>) -> Self {
        Self {
            enabled,
            from: from.into(),
        }
    }

    fn deliver(&self, kind: &'static str, email: &str, token: &str) {
        if !self.enabled {
            info!(kind, to = %email, "Email disabled, not sending");
            return;
        }

        info!(
            kind,
            from = %self.from,
            to = %email,
            token = %token_prefix(token),
            "Sending email"
        );
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.deliver("email_verification", email, token);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.deliver("password_reset", email, token);
        Ok(())
    }
}

/// Kind of recorded message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Verification,
    PasswordReset,
}

/// Captured message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub kind: MailKind,
    pub to: String,
    pub token: String,
}

/// Mailer that records every message in memory
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailer whose every send fails (after recording the attempt)
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            failing: true,
        }
    }

    /// All messages so far
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token of the most recent message of `kind` sent to `to`
    pub fn last_token(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.token)
    }

    fn record(&self, kind: MailKind, to: &str, token: &str) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMail {
                kind,
                to: to.to_string(),
                token: token.to_string(),
            });
        }

        if self.failing {
            return Err(MailError::Delivery("recording mailer set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.record(MailKind::Verification, email, token)
    }

    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.record(MailKind::PasswordReset, email, token)
    }
}
