//! 事件路由
//!
//! [`route`] 是纯函数：领域事件 → 扇出清单 `Vec<Emit>`，
//! 每条 emit 是 (目标, 线上事件名, payload)。路由表与广播解耦，
//! 房间矩阵可以脱离任何连接单测。
//!
//! 安全码只进 `receptionist` 房间；其余任何房间的 payload 不得携带。

use std::sync::Arc;

use serde_json::{Value, json};
use shared::{
    AttentionKind, DomainEvent, OrderStatus, Priority, TableStatus, now_millis,
    order_status_message,
};

use super::connection::ConnectionManager;
use super::room::Room;

/// 扇出目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 单个房间
    Room(Room),
    /// 全量广播 (仅菜品可用性与紧急告警)
    All,
}

/// 一条待投递的扇出
#[derive(Debug, Clone)]
pub struct Emit {
    pub target: Target,
    pub event: &'static str,
    pub payload: Value,
}

fn to(room: Room, event: &'static str, payload: Value) -> Emit {
    Emit {
        target: Target::Room(room),
        event,
        payload,
    }
}

fn to_all(event: &'static str, payload: Value) -> Emit {
    Emit {
        target: Target::All,
        event,
        payload,
    }
}

/// 计算领域事件的扇出清单
///
/// 房间矩阵对齐既有前端契约，事件名逐字节固定。
pub fn route(event: &DomainEvent) -> Vec<Emit> {
    let ts = now_millis();
    match event {
        DomainEvent::OrderCreated { session_id, order } => vec![
            // 后厨收到完整菜品明细并播放提示音
            to(
                Room::Kitchen,
                "kitchen:new-order",
                json!({ "sessionId": session_id, "order": order, "sound": true, "timestamp": ts }),
            ),
            to(
                Room::AdminDashboard,
                "dashboard:order-created",
                json!({
                    "sessionId": session_id,
                    "orderId": order.order_id,
                    "tableId": order.table_id,
                    "total": order.total,
                    "timestamp": ts,
                }),
            ),
            to(
                Room::Session(session_id.clone()),
                "order:placed",
                json!({
                    "orderId": order.order_id,
                    "message": order_status_message(OrderStatus::Placed),
                    "timestamp": ts,
                }),
            ),
        ],

        DomainEvent::OrderStatusChanged {
            session_id,
            order_id,
            table_id,
            new_status,
        } => {
            let dashboard = json!({
                "orderId": order_id,
                "tableId": table_id,
                "status": new_status,
                "timestamp": ts,
            });
            let mut emits = vec![
                to(
                    Room::Session(session_id.clone()),
                    "order:status-update",
                    json!({
                        "orderId": order_id,
                        "status": new_status,
                        "message": order_status_message(*new_status),
                        "timestamp": ts,
                    }),
                ),
                to(Room::AdminDashboard, "dashboard:order-status", dashboard.clone()),
                to(Room::KitchenDashboard, "dashboard:order-status", dashboard),
            ];
            if *new_status == OrderStatus::Ready {
                emits.push(to(
                    Room::Staff,
                    "staff:order-ready",
                    json!({
                        "orderId": order_id,
                        "tableId": table_id,
                        "priority": Priority::High,
                        "timestamp": ts,
                    }),
                ));
            }
            emits
        }

        DomainEvent::OrderAccepted {
            session_id,
            order_id,
            estimated_minutes,
        } => vec![to(
            Room::Session(session_id.clone()),
            "order:accepted",
            json!({
                "orderId": order_id,
                "estimatedMinutes": estimated_minutes,
                "message": order_status_message(OrderStatus::Accepted),
                "timestamp": ts,
            }),
        )],

        DomainEvent::OrderRejected {
            session_id,
            order_id,
            reason,
        } => vec![
            to(
                Room::Session(session_id.clone()),
                "order:rejected",
                json!({ "orderId": order_id, "reason": reason, "timestamp": ts }),
            ),
            to(
                Room::AdminDashboard,
                "dashboard:order-rejected",
                json!({ "orderId": order_id, "reason": reason, "timestamp": ts }),
            ),
        ],

        DomainEvent::OrderCancelled {
            session_id,
            order_id,
            cancelled_by,
        } => vec![
            to(
                Room::Session(session_id.clone()),
                "order:cancelled",
                json!({ "orderId": order_id, "cancelledBy": cancelled_by, "timestamp": ts }),
            ),
            to(
                Room::AdminDashboard,
                "dashboard:order-cancelled",
                json!({ "orderId": order_id, "cancelledBy": cancelled_by, "timestamp": ts }),
            ),
        ],

        DomainEvent::BillGenerated { session_id, bill } => {
            let payload = json!({ "bill": bill, "timestamp": ts });
            vec![
                to(Room::Session(session_id.clone()), "bill:ready", payload.clone()),
                to(Room::Staff, "staff:bill-generated", payload.clone()),
                to(Room::AdminDashboard, "dashboard:bill-generated", payload),
            ]
        }

        DomainEvent::BillUpdated { session_id, bill } => {
            let payload = json!({ "bill": bill, "timestamp": ts });
            vec![
                to(Room::Session(session_id.clone()), "bill:updated", payload.clone()),
                to(Room::Staff, "staff:bill-updated", payload.clone()),
                to(Room::AdminDashboard, "dashboard:bill-updated", payload.clone()),
                // 显式订阅账单的连接也收一份
                to(Room::Bill(bill.bill_id.clone()), "bill:updated", payload),
            ]
        }

        DomainEvent::PaymentInitiated {
            session_id,
            bill_id,
            method,
            amount,
        } => {
            let payload = json!({
                "billId": bill_id,
                "method": method,
                "amount": amount,
                "timestamp": ts,
            });
            vec![
                to(Room::Session(session_id.clone()), "payment:initiated", payload.clone()),
                to(Room::Staff, "staff:payment-initiated", payload.clone()),
                to(Room::AdminDashboard, "dashboard:payment-initiated", payload),
            ]
        }

        DomainEvent::PaymentReceived {
            session_id,
            bill_id,
            method,
            amount,
        } => {
            let payload = json!({
                "billId": bill_id,
                "method": method,
                "amount": amount,
                "timestamp": ts,
            });
            let staff_payload = json!({
                "billId": bill_id,
                "method": method,
                "amount": amount,
                "priority": Priority::High,
                "sound": true,
                "timestamp": ts,
            });
            vec![
                to(Room::Session(session_id.clone()), "payment:received", payload.clone()),
                to(Room::Staff, "staff:payment-received", staff_payload),
                to(Room::AdminDashboard, "dashboard:payment-received", payload.clone()),
                to(Room::Bill(bill_id.clone()), "payment:received", payload),
            ]
        }

        DomainEvent::PaymentFailed {
            session_id,
            bill_id,
            reason,
        } => {
            let payload = json!({ "billId": bill_id, "reason": reason, "timestamp": ts });
            let staff_payload = json!({
                "billId": bill_id,
                "reason": reason,
                "priority": Priority::High,
                "sound": true,
                "timestamp": ts,
            });
            vec![
                to(Room::Session(session_id.clone()), "payment:failed", payload.clone()),
                to(Room::Staff, "staff:payment-failed", staff_payload),
                to(Room::AdminDashboard, "dashboard:payment-failed", payload),
            ]
        }

        DomainEvent::TableSessionStarted {
            session_id,
            table_id,
            security_code,
        } => {
            let public = json!({ "sessionId": session_id, "tableId": table_id, "timestamp": ts });
            vec![
                to(Room::AdminDashboard, "dashboard:session-started", public.clone()),
                // 安全码只进前台接待房间，供口头告知顾客
                to(
                    Room::Receptionist,
                    "receptionist:session-started",
                    json!({
                        "sessionId": session_id,
                        "tableId": table_id,
                        "securityCode": security_code,
                        "timestamp": ts,
                    }),
                ),
                to(Room::Staff, "staff:session-started", public),
            ]
        }

        DomainEvent::TableSessionEnded {
            session_id,
            table_id,
            reason,
        } => {
            let payload = json!({
                "sessionId": session_id,
                "tableId": table_id,
                "reason": reason,
                "timestamp": ts,
            });
            vec![
                to(Room::AdminDashboard, "dashboard:session-ended", payload.clone()),
                to(Room::Receptionist, "receptionist:session-ended", payload.clone()),
                to(Room::Staff, "staff:session-ended", payload),
            ]
        }

        DomainEvent::SessionTransferred {
            session_id,
            old_table_id,
            new_table_id,
        } => {
            let payload = json!({
                "sessionId": session_id,
                "oldTableId": old_table_id,
                "newTableId": new_table_id,
                "timestamp": ts,
            });
            vec![
                to(Room::Session(session_id.clone()), "session:transferred", payload.clone()),
                to(Room::AdminDashboard, "dashboard:session-transferred", payload.clone()),
                to(Room::Receptionist, "receptionist:session-transferred", payload),
            ]
        }

        DomainEvent::TableStatusChanged {
            table_id,
            new_status,
        } => {
            let payload = json!({ "tableId": table_id, "status": new_status, "timestamp": ts });
            let mut emits = vec![
                to(Room::AdminDashboard, "dashboard:table-status", payload.clone()),
                to(Room::Staff, "staff:table-status", payload),
            ];
            if *new_status == TableStatus::Maintenance {
                emits.push(to(
                    Room::Staff,
                    "staff:maintenance-alert",
                    json!({ "tableId": table_id, "priority": Priority::High, "timestamp": ts }),
                ));
            }
            emits
        }

        DomainEvent::TableAttentionRequired {
            table_id,
            session_id,
            kind,
        } => {
            let priority = if *kind == AttentionKind::Complaint {
                Priority::Urgent
            } else {
                Priority::High
            };
            vec![
                to(
                    Room::Staff,
                    "staff:attention-required",
                    json!({
                        "tableId": table_id,
                        "sessionId": session_id,
                        "kind": kind,
                        "priority": priority,
                        "sound": true,
                        "timestamp": ts,
                    }),
                ),
                to(
                    Room::AdminDashboard,
                    "dashboard:attention-required",
                    json!({ "tableId": table_id, "kind": kind, "timestamp": ts }),
                ),
                // 回执：告知顾客呼叫已送达
                to(
                    Room::Session(session_id.clone()),
                    "table:attention-ack",
                    json!({ "message": "Staff has been notified", "timestamp": ts }),
                ),
            ]
        }

        DomainEvent::TableAttentionResolved {
            table_id,
            session_id,
            resolved_by,
        } => {
            let payload = json!({
                "tableId": table_id,
                "resolvedBy": resolved_by,
                "timestamp": ts,
            });
            vec![
                to(Room::Staff, "staff:attention-resolved", payload.clone()),
                to(Room::AdminDashboard, "dashboard:attention-resolved", payload.clone()),
                to(Room::Session(session_id.clone()), "table:attention-resolved", payload),
            ]
        }

        DomainEvent::MenuItemUnavailable {
            item_id,
            name,
            marked_by,
        } => vec![
            to_all(
                "menu:item-unavailable",
                json!({ "itemId": item_id, "name": name, "timestamp": ts }),
            ),
            to(
                Room::Staff,
                "staff:item-86",
                json!({ "itemId": item_id, "name": name, "markedBy": marked_by, "timestamp": ts }),
            ),
        ],

        DomainEvent::MenuItemAvailable { item_id, name } => vec![
            to_all(
                "menu:item-available",
                json!({ "itemId": item_id, "name": name, "timestamp": ts }),
            ),
            to(
                Room::Staff,
                "staff:item-restored",
                json!({ "itemId": item_id, "name": name, "timestamp": ts }),
            ),
        ],

        DomainEvent::EmergencyAlert { message, raised_by } => vec![to_all(
            "emergency:alert",
            json!({
                "message": message,
                "raisedBy": raised_by,
                "priority": Priority::Critical,
                "timestamp": ts,
            }),
        )],
    }
}

/// 事件路由器
///
/// 把 [`route`] 的扇出清单逐条广播出去。投递 fire-and-forget，
/// 单个房间失败不影响其他房间也不影响调用方。
pub struct EventRouter {
    connections: Arc<ConnectionManager>,
}

impl EventRouter {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// 扇出一个领域事件，返回总投递连接数
    pub fn publish(&self, event: &DomainEvent) -> usize {
        let emits = route(event);
        let mut delivered = 0;
        for emit in emits {
            let count = match &emit.target {
                Target::Room(room) => {
                    let n = self.connections.broadcast(room, emit.event, &emit.payload);
                    tracing::debug!(room = %room, event = emit.event, delivered = n, "Broadcast");
                    n
                }
                Target::All => {
                    let n = self.connections.broadcast_all(emit.event, &emit.payload);
                    tracing::debug!(event = emit.event, delivered = n, "Broadcast to all");
                    n
                }
            };
            delivered += count;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BillSummary, OrderItem, OrderSummary, PaymentMethod};

    fn order() -> OrderSummary {
        OrderSummary {
            order_id: "o-1".into(),
            table_id: "T1".into(),
            items: vec![OrderItem {
                item_id: "i-1".into(),
                name: "Noodles".into(),
                quantity: 2,
                note: None,
            }],
            total: 2400,
        }
    }

    fn bill() -> BillSummary {
        BillSummary {
            bill_id: "b-1".into(),
            session_id: "s-1".into(),
            table_id: "T1".into(),
            total: 2400,
            settled: false,
        }
    }

    fn rooms_of(emits: &[Emit]) -> Vec<String> {
        emits
            .iter()
            .map(|e| match &e.target {
                Target::Room(r) => r.to_string(),
                Target::All => "*".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_order_created_fan_out() {
        let emits = route(&DomainEvent::OrderCreated {
            session_id: "s-1".into(),
            order: order(),
        });

        assert_eq!(
            rooms_of(&emits),
            vec!["kitchen", "admin-dashboard", "session:s-1"]
        );
        let kitchen = &emits[0];
        assert_eq!(kitchen.event, "kitchen:new-order");
        assert_eq!(kitchen.payload["sound"], true);
        assert_eq!(kitchen.payload["order"]["items"][0]["name"], "Noodles");
        // the dashboard copy carries the total but not the item detail
        assert!(emits[1].payload.get("order").is_none());
    }

    #[test]
    fn test_order_ready_reaches_exactly_four_rooms() {
        let emits = route(&DomainEvent::OrderStatusChanged {
            session_id: "s-1".into(),
            order_id: "o-1".into(),
            table_id: "T1".into(),
            new_status: OrderStatus::Ready,
        });

        assert_eq!(
            rooms_of(&emits),
            vec!["session:s-1", "admin-dashboard", "kitchen-dashboard", "staff"]
        );
        assert_eq!(emits[0].event, "order:status-update");
        assert_eq!(emits[0].payload["message"], "Your order is ready");
        assert_eq!(emits[3].event, "staff:order-ready");
    }

    #[test]
    fn test_non_ready_status_skips_staff() {
        let emits = route(&DomainEvent::OrderStatusChanged {
            session_id: "s-1".into(),
            order_id: "o-1".into(),
            table_id: "T1".into(),
            new_status: OrderStatus::Preparing,
        });
        assert!(!rooms_of(&emits).contains(&"staff".to_string()));
    }

    #[test]
    fn test_security_code_only_reaches_receptionist() {
        let emits = route(&DomainEvent::TableSessionStarted {
            session_id: "s-1".into(),
            table_id: "T1".into(),
            security_code: "042519".into(),
        });

        for emit in &emits {
            let has_code = emit.payload.get("securityCode").is_some();
            match &emit.target {
                Target::Room(Room::Receptionist) => {
                    assert!(has_code);
                    assert_eq!(emit.payload["securityCode"], "042519");
                }
                _ => assert!(!has_code, "code leaked to {:?}", emit.target),
            }
        }
    }

    #[test]
    fn test_bill_updated_includes_bill_room() {
        let emits = route(&DomainEvent::BillUpdated {
            session_id: "s-1".into(),
            bill: bill(),
        });
        assert_eq!(
            rooms_of(&emits),
            vec!["session:s-1", "staff", "admin-dashboard", "bill:b-1"]
        );
    }

    #[test]
    fn test_payment_received_staff_copy_is_high_priority() {
        let emits = route(&DomainEvent::PaymentReceived {
            session_id: "s-1".into(),
            bill_id: "b-1".into(),
            method: PaymentMethod::Card,
            amount: 2400,
        });

        let staff = emits
            .iter()
            .find(|e| e.event == "staff:payment-received")
            .unwrap();
        assert_eq!(staff.payload["priority"], "HIGH");
        assert_eq!(staff.payload["sound"], true);
        // the customer copy carries no notification metadata
        assert!(emits[0].payload.get("priority").is_none());
    }

    #[test]
    fn test_complaint_escalates_to_urgent() {
        let emits = route(&DomainEvent::TableAttentionRequired {
            table_id: "T1".into(),
            session_id: "s-1".into(),
            kind: AttentionKind::Complaint,
        });
        assert_eq!(emits[0].payload["priority"], "URGENT");

        let emits = route(&DomainEvent::TableAttentionRequired {
            table_id: "T1".into(),
            session_id: "s-1".into(),
            kind: AttentionKind::Water,
        });
        assert_eq!(emits[0].payload["priority"], "HIGH");
    }

    #[test]
    fn test_maintenance_adds_staff_alert() {
        let emits = route(&DomainEvent::TableStatusChanged {
            table_id: "T1".into(),
            new_status: TableStatus::Maintenance,
        });
        assert!(emits.iter().any(|e| e.event == "staff:maintenance-alert"));

        let emits = route(&DomainEvent::TableStatusChanged {
            table_id: "T1".into(),
            new_status: TableStatus::Occupied,
        });
        assert!(!emits.iter().any(|e| e.event == "staff:maintenance-alert"));
    }

    #[test]
    fn test_menu_and_emergency_broadcast_to_all() {
        let emits = route(&DomainEvent::MenuItemUnavailable {
            item_id: "i-1".into(),
            name: "Noodles".into(),
            marked_by: Some(shared::StaffRole::Kitchen),
        });
        assert_eq!(emits[0].target, Target::All);
        assert_eq!(emits[0].event, "menu:item-unavailable");
        assert_eq!(emits[1].event, "staff:item-86");

        let emits = route(&DomainEvent::EmergencyAlert {
            message: "Fire drill".into(),
            raised_by: "emp-1".into(),
        });
        assert_eq!(emits.len(), 1);
        assert_eq!(emits[0].target, Target::All);
        assert_eq!(emits[0].payload["priority"], "CRITICAL");
    }
}
