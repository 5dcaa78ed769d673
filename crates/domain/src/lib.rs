//! Domain layer for the storefront order service.
//!
//! This crate holds the rules that do not depend on storage:
//! - Money and the shipping-fee pricing policy
//! - Checkout validation into an [`OrderDraft`]
//! - The inventory ledger check used by every store implementation
//! - Order status transitions and the admin [`StatusPolicy`]
//! - Rendering of transactional emails
//! - The session-scoped cart service

pub mod cart;
pub mod error;
pub mod inventory;
pub mod money;
pub mod notification;
pub mod order;
pub mod product;

pub use cart::{
    Cart, CartError, CartItem, CartOwner, CartService, CartStorage, InMemoryCartStorage,
    MAX_ITEM_QUANTITY,
};
pub use error::DomainError;
pub use inventory::{Reservation, StockLevel, check_reservation};
pub use money::Money;
pub use notification::{EmailMessage, Notification, NotificationKind};
pub use order::{
    CheckoutRequest, CustomerDetails, DraftLine, FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD, Order,
    OrderDetails, OrderDraft, OrderLine, OrderStatus, OrderTotals, PaymentRecord, PricedLine,
    RequestedItem, ShippingAddress, StatusPolicy, shipping_fee,
};
pub use product::{MAX_UNIT_PRICE, Product, ProductDraft, ProductInput};
