//! Order email delivery.
//!
//! Order changes queue rendered emails in the store's outbox inside their
//! own transaction. The [`NotificationDispatcher`] drains that outbox in
//! the background through a [`Mailer`], retrying failed sends with
//! exponential backoff and parking messages that keep failing.

pub mod dispatcher;
pub mod error;
pub mod mailer;

pub use dispatcher::{DeliveryReport, DispatcherConfig, NotificationDispatcher};
pub use error::{NotifyError, Result};
pub use mailer::{InMemoryMailer, LogMailer, Mailer, SendGridMailer};
