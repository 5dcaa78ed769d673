use common::{NotificationId, OrderId, ProductId};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when reading or writing storefront state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule rejected the operation. Nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The outbox entry does not exist.
    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// A guarded write affected an unexpected number of rows.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back into the domain.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A test fail point fired inside a transaction.
    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
