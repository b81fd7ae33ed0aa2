//! Mail-sending seam.
//!
//! The account service sends activation and password-reset mails through
//! this trait. Delivery is best-effort: a mail failure never rolls back
//! the operation that triggered it.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

/// Errors from a mail backend.
#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// A capability to send a plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `body` to `to` with the given subject.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<RecordedMail>,
    fail_on_send: bool,
}

/// A mail captured by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// In-memory mailer for tests. Records every sent mail and can be told
/// to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingMailer {
    /// Creates a new recording mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mailer to fail on subsequent sends.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns every mail sent so far.
    pub fn sent(&self) -> Vec<RecordedMail> {
        self.state.read().unwrap().sent.clone()
    }

    /// Returns the last mail sent to `to`, if any.
    pub fn last_to(&self, to: &str) -> Option<RecordedMail> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_send {
            return Err(MailError("simulated failure".to_string()));
        }
        state.sent.push(RecordedMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Mailer for local runs: logs that a mail would have been sent.
///
/// The body (which carries the token) is not logged.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
        tracing::info!(%to, %subject, "mail send (log backend, body suppressed)");
        Ok(())
    }
}
