//! Order checkout, pricing, lifecycle and read models.

mod checkout;
mod model;
mod pricing;
mod status;

pub use checkout::{
    CheckoutRequest, CustomerDetails, DraftLine, OrderDraft, RequestedItem, ShippingAddress,
};
pub use model::{Order, OrderDetails, OrderLine, PaymentRecord, PricedLine};
pub use pricing::{FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD, OrderTotals, shipping_fee};
pub use status::{OrderStatus, StatusPolicy};
