//! Storage for the storefront: catalog, orders, inventory and the
//! notification outbox.
//!
//! Every mutating order operation runs as one unit of work. Placement
//! checks and debits stock, writes the order and enqueues the
//! confirmation email together; cancellation restocks, flips the status and
//! enqueues the cancellation email together. Either everything is visible
//! afterwards or nothing is.

pub mod cart;
pub mod error;
mod ledger;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod store;

pub use cart::PostgresCartStorage;
pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStore};
pub use outbox::{DeliveryStatus, OutboxMessage};
pub use postgres::PostgresStore;
pub use store::{
    CatalogStore, NotificationOutbox, OrderStore, StatusChange, StoreStats, Storefront,
};
