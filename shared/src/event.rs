//! Domain events - state changes fanned out to connected rooms
//!
//! Each variant is one concrete, validated payload shape. The event router
//! computes target rooms and the per-room outbound payload from these; the
//! events themselves are transient and never persisted by the real-time
//! subsystem.

use serde::{Deserialize, Serialize};

use crate::role::StaffRole;
use crate::types::{
    AttentionKind, BillSummary, OrderStatus, OrderSummary, PaymentMethod, TableStatus,
};

/// 领域事件
///
/// 订单、账单、桌台、支付等子系统产生的状态变更通知。
/// 路由规则（事件 → 房间集合）是事件类型和字段的纯函数。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    // ========== Orders ==========
    OrderCreated {
        session_id: String,
        order: OrderSummary,
    },
    OrderStatusChanged {
        session_id: String,
        order_id: String,
        table_id: String,
        new_status: OrderStatus,
    },
    OrderAccepted {
        session_id: String,
        order_id: String,
        /// Minutes until ready; validated to 1..=180 by the order service
        estimated_minutes: u32,
    },
    OrderRejected {
        session_id: String,
        order_id: String,
        reason: String,
    },
    OrderCancelled {
        session_id: String,
        order_id: String,
        cancelled_by: String,
    },

    // ========== Bills & payments ==========
    BillGenerated {
        session_id: String,
        bill: BillSummary,
    },
    BillUpdated {
        session_id: String,
        bill: BillSummary,
    },
    PaymentInitiated {
        session_id: String,
        bill_id: String,
        method: PaymentMethod,
        amount: i64,
    },
    PaymentReceived {
        session_id: String,
        bill_id: String,
        method: PaymentMethod,
        amount: i64,
    },
    PaymentFailed {
        session_id: String,
        bill_id: String,
        reason: String,
    },

    // ========== Table sessions ==========
    TableSessionStarted {
        session_id: String,
        table_id: String,
        /// Plaintext code relayed to the receptionist room ONLY; the router
        /// must never place this in any other room's payload.
        security_code: String,
    },
    TableSessionEnded {
        session_id: String,
        table_id: String,
        reason: String,
    },
    SessionTransferred {
        session_id: String,
        old_table_id: String,
        new_table_id: String,
    },

    // ========== Tables ==========
    TableStatusChanged {
        table_id: String,
        new_status: TableStatus,
    },
    TableAttentionRequired {
        table_id: String,
        session_id: String,
        kind: AttentionKind,
    },
    TableAttentionResolved {
        table_id: String,
        session_id: String,
        resolved_by: String,
    },

    // ========== Kitchen / menu (public visibility) ==========
    MenuItemUnavailable {
        item_id: String,
        name: String,
        marked_by: Option<StaffRole>,
    },
    MenuItemAvailable {
        item_id: String,
        name: String,
    },

    // ========== Emergency ==========
    EmergencyAlert {
        message: String,
        raised_by: String,
    },
}

/// Customer-facing message for an order status transition
pub fn order_status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Placed => "Your order has been placed",
        OrderStatus::Accepted => "Your order has been accepted",
        OrderStatus::Preparing => "Your order is being prepared",
        OrderStatus::Ready => "Your order is ready",
        OrderStatus::Served => "Your order has been served",
        OrderStatus::Rejected => "Your order was rejected",
        OrderStatus::Cancelled => "Your order was cancelled",
    }
}
