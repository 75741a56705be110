//! 会话实体
//!
//! 一个顾客对一张物理桌台的临时操作权。授权单元是会话而非桌台记录。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 桌台会话
///
/// # 不变量
///
/// - 同一 `table_id` 同时至多一个活跃会话（创建新会话会先失活旧会话）
/// - 同一 `device_id` 同时至多一个活跃会话
/// - `verification_attempts <= max_verification_attempts`，达到上限强制失活
/// - `is_verified` 单调：一旦为 true 不再回退
/// - `expires_at` 只能为已验证的活跃会话延长，且不超过 `created_at + 8h`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSession {
    pub session_id: String,
    pub table_id: String,
    /// 绑定的客户端设备/浏览器实例
    pub device_id: String,
    /// 明文安全码。永不序列化进任何 API 响应或广播 payload；
    /// 创建接口通过独立字段返回一次。
    #[serde(skip_serializing, default)]
    pub security_code: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub verification_attempts: u32,
    pub max_verification_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// 创建会话的员工身份
    pub created_by: String,
}

impl TableSession {
    /// 创建未验证的活跃会话
    pub fn new(
        table_id: &str,
        device_id: &str,
        created_by: &str,
        security_code: &str,
        ttl_hours: i64,
        max_verification_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            table_id: table_id.to_string(),
            device_id: device_id.to_string(),
            security_code: security_code.to_string(),
            is_active: true,
            is_verified: false,
            verification_attempts: 0,
            max_verification_attempts,
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            verified_at: None,
            ended_at: None,
            created_by: created_by.to_string(),
        }
    }

    /// 是否已过期 (懒检测，不是存储状态)
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// 剩余验证次数
    pub fn remaining_attempts(&self) -> u32 {
        self.max_verification_attempts
            .saturating_sub(self.verification_attempts)
    }

    /// 失活（终态转换，幂等）
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.ended_at = Some(now);
        }
    }

    /// 延长的硬上限：创建起 8 小时
    pub fn max_expiry(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(8)
    }
}
