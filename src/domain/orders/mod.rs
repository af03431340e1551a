//! Pending orders - the provider's view of orders awaiting a decision.

pub mod countdown;
pub mod order_book;
pub mod pending_order;

pub use countdown::{remaining_label, Countdown, EXPIRED_LABEL};
pub use order_book::{BookChange, OrderBook, OrderCountdownView, OrderListView};
pub use pending_order::{
    CustomerProfile, CustomerRef, OrderStatus, OrderUpdate, OrderedDish, PendingOrder,
};
