//! 房间命名
//!
//! 房间是连接加入的命名广播组。类型化枚举避免手拼字符串；
//! `Display` 输出即线上房间名。

use std::fmt;

use shared::StaffRole;

/// 广播房间
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// 单个顾客会话 (`session:{sessionId}`)
    Session(String),
    /// 单个桌台 (`table:{tableId}`)
    Table(String),
    /// 单个订单，需显式订阅 (`order:{orderId}`)
    Order(String),
    /// 单个账单，需显式订阅 (`bill:{billId}`)
    Bill(String),
    /// 全体员工
    Staff,
    /// 后厨
    Kitchen,
    /// 管理员
    Admin,
    /// 前台接待
    Receptionist,
    /// 厨房仪表盘 (Kitchen/Admin 可订阅)
    KitchenDashboard,
    /// 管理仪表盘 (仅 Admin 可订阅)
    AdminDashboard,
}

impl Room {
    /// 员工角色对应的角色房间
    pub fn for_role(role: StaffRole) -> Option<Room> {
        match role {
            StaffRole::Admin => Some(Room::Admin),
            StaffRole::Kitchen => Some(Room::Kitchen),
            StaffRole::Receptionist => Some(Room::Receptionist),
            StaffRole::Waiter => None,
        }
    }

    /// 解析显式订阅的房间名；只有 order/bill 房间接受显式订阅
    pub fn parse_subscribable(name: &str) -> Option<Room> {
        if let Some(id) = name.strip_prefix("order:") {
            if id.is_empty() {
                return None;
            }
            return Some(Room::Order(id.to_string()));
        }
        if let Some(id) = name.strip_prefix("bill:") {
            if id.is_empty() {
                return None;
            }
            return Some(Room::Bill(id.to_string()));
        }
        None
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Session(id) => write!(f, "session:{}", id),
            Room::Table(id) => write!(f, "table:{}", id),
            Room::Order(id) => write!(f, "order:{}", id),
            Room::Bill(id) => write!(f, "bill:{}", id),
            Room::Staff => write!(f, "staff"),
            Room::Kitchen => write!(f, "kitchen"),
            Room::Admin => write!(f, "admin"),
            Room::Receptionist => write!(f, "receptionist"),
            Room::KitchenDashboard => write!(f, "kitchen-dashboard"),
            Room::AdminDashboard => write!(f, "admin-dashboard"),
        }
    }
}
