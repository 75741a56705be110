//! 员工角色
//!
//! 角色决定员工连接加入哪些广播房间，以及可订阅哪些仪表盘。

use serde::{Deserialize, Serialize};

/// Staff role carried in JWT claims and connection tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    /// 管理员 - 可订阅所有仪表盘
    Admin,
    /// 后厨 - 可订阅厨房仪表盘
    Kitchen,
    /// 前台接待 - 唯一能收到明文安全码的角色
    Receptionist,
    /// 服务员
    Waiter,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Kitchen => "kitchen",
            StaffRole::Receptionist => "receptionist",
            StaffRole::Waiter => "waiter",
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown staff role: {0}")]
pub struct UnknownRole(String);

impl std::str::FromStr for StaffRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(StaffRole::Admin),
            "kitchen" => Ok(StaffRole::Kitchen),
            "receptionist" => Ok(StaffRole::Receptionist),
            "waiter" => Ok(StaffRole::Waiter),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
