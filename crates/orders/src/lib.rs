//! Order lifecycle service.
//!
//! [`OrderService`] validates checkout requests, delegates the atomic work
//! to an [`store::OrderStore`], records metrics and wakes the notification
//! dispatcher once an email has been queued.

pub mod error;
pub mod service;

pub use error::{OrderServiceError, Result};
pub use service::OrderService;
