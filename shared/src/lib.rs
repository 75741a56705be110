//! Shared types for the DineLink platform
//!
//! Wire-contract types used by the server and any native client:
//! domain events, staff roles, order/bill/table value types and small
//! utility helpers. Field names on these types ARE the wire contract —
//! renaming a serde field here breaks deployed clients.

pub mod event;
pub mod role;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use event::{DomainEvent, order_status_message};
pub use role::StaffRole;
pub use types::{
    AttentionKind, BillSummary, OrderItem, OrderStatus, OrderSummary, PaymentMethod, Priority,
    TableStatus,
};
pub use util::now_millis;
