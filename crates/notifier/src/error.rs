//! Notifier error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur while delivering notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP request to the mail provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The mail provider answered with a non-success status.
    #[error("Mail provider rejected message: HTTP {status} - {body}")]
    Rejected { status: u16, body: String },

    /// The mailer is unavailable (used by test mailers).
    #[error("Mailer unavailable: {0}")]
    Unavailable(String),

    /// Outbox bookkeeping failed.
    #[error("Outbox error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for notifier results.
pub type Result<T> = std::result::Result<T, NotifyError>;
