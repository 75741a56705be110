//! 连接管理器 - 房间注册表
//!
//! 跟踪每个在线连接属于哪些房间，并按签发的令牌认证连接。
//! 显式构造的实例由宿主持有引用传递，不做模块级单例；
//! 多进程部署需要把注册表换成外部 broker，单进程契约内存实现即可。
//!
//! ## 并发纪律
//!
//! - 房间成员变更按房间原子（DashMap entry 锁）
//! - 广播读取成员快照后立即释放锁再投递；广播期间加入的连接
//!   可能收到也可能收不到这一条，属于可接受竞态
//! - 绝不同时持有连接表和房间表的 entry 锁

use std::collections::HashSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::StaffRole;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::room::Room;
use crate::auth::{JwtService, TokenKind};
use crate::security_log;
use crate::utils::AppError;

/// 连接标识
pub type ConnectionId = Uuid;

/// 连接声明的客户端类型 (认证握手消息携带)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Customer,
    Staff,
}

/// 认证后打在连接上的标签，房间成员关系由此推导
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionClaims {
    pub kind: ClientKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<StaffRole>,
}

/// 出站消息帧
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub event: String,
    pub data: Value,
}

impl OutboundMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

struct ConnectionEntry {
    sender: mpsc::UnboundedSender<OutboundMessage>,
    claims: Option<ConnectionClaims>,
    rooms: HashSet<Room>,
}

/// 连接管理器
pub struct ConnectionManager {
    jwt: Arc<JwtService>,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    rooms: DashMap<Room, HashSet<ConnectionId>>,
}

impl ConnectionManager {
    pub fn new(jwt: Arc<JwtService>) -> Self {
        Self {
            jwt,
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// 注册新连接，返回连接 ID
    ///
    /// 此时连接未认证、不属于任何房间。
    pub fn register(&self, sender: mpsc::UnboundedSender<OutboundMessage>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            ConnectionEntry {
                sender,
                claims: None,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(connection = %id, "Connection registered");
        id
    }

    /// 认证连接 (连接建立后的握手消息，不是建连前置条件)
    ///
    /// 成功后按声明类型加入默认房间：
    /// - 顾客 + sessionId claim → `session:{id}`，有 tableId 再加 `table:{id}`
    /// - 员工 + role claim → `staff` + 对应角色房间
    ///
    /// 失败只返回错误，连接保持在线、未认证、无房间，可重试。
    pub fn authenticate(
        &self,
        conn_id: ConnectionId,
        token: &str,
        declared: ClientKind,
    ) -> Result<ConnectionClaims, AppError> {
        let token_claims = self.jwt.verify_token(token).map_err(|e| {
            security_log!(
                "WARN",
                "ws_auth_failed",
                connection = %conn_id,
                error = format!("{}", e)
            );
            AppError::unauthorized("Invalid token")
        })?;

        let claims = match declared {
            ClientKind::Customer => {
                if token_claims.token_type != TokenKind::Session {
                    return Err(AppError::unauthorized(
                        "Customer connections require a session token",
                    ));
                }
                ConnectionClaims {
                    kind: ClientKind::Customer,
                    user_id: None,
                    session_id: token_claims.session_id,
                    table_id: token_claims.table_id,
                    device_id: token_claims.device_id,
                    role: None,
                }
            }
            ClientKind::Staff => {
                if token_claims.token_type != TokenKind::Staff {
                    return Err(AppError::unauthorized(
                        "Staff connections require a staff token",
                    ));
                }
                ConnectionClaims {
                    kind: ClientKind::Staff,
                    user_id: token_claims.user_id,
                    session_id: None,
                    table_id: None,
                    device_id: None,
                    role: token_claims.role,
                }
            }
        };

        // 标签落到连接上
        {
            let mut entry = self
                .connections
                .get_mut(&conn_id)
                .ok_or_else(|| AppError::not_found("Connection not registered"))?;
            entry.claims = Some(claims.clone());
        }

        // 按标签加入默认房间
        match claims.kind {
            ClientKind::Customer => {
                if let Some(session_id) = &claims.session_id {
                    self.join(conn_id, Room::Session(session_id.clone()));
                    if let Some(table_id) = &claims.table_id {
                        self.join(conn_id, Room::Table(table_id.clone()));
                    }
                }
            }
            ClientKind::Staff => {
                if let Some(role) = claims.role {
                    self.join(conn_id, Room::Staff);
                    if let Some(room) = Room::for_role(role) {
                        self.join(conn_id, room);
                    }
                }
            }
        }

        security_log!(
            "INFO",
            "ws_authenticated",
            connection = %conn_id,
            kind = format!("{:?}", claims.kind)
        );

        Ok(claims)
    }

    /// 显式订阅 order/bill 房间
    ///
    /// 只有持 sessionId claim 的已认证连接可订阅（员工走角色房间）。
    pub fn subscribe_room(&self, conn_id: ConnectionId, room_name: &str) -> Result<Room, AppError> {
        let has_session = self
            .connections
            .get(&conn_id)
            .and_then(|e| e.claims.as_ref().and_then(|c| c.session_id.clone()))
            .is_some();
        if !has_session {
            return Err(AppError::unauthorized(
                "Subscription requires an authenticated session",
            ));
        }

        let room = Room::parse_subscribable(room_name)
            .ok_or_else(|| AppError::validation(format!("Room {} is not subscribable", room_name)))?;

        self.join(conn_id, room.clone());
        Ok(room)
    }

    /// 退订 order/bill 房间
    pub fn unsubscribe_room(
        &self,
        conn_id: ConnectionId,
        room_name: &str,
    ) -> Result<Room, AppError> {
        let room = Room::parse_subscribable(room_name)
            .ok_or_else(|| AppError::validation(format!("Room {} is not subscribable", room_name)))?;
        self.leave(conn_id, &room);
        Ok(room)
    }

    /// 订阅仪表盘 (角色门禁)
    ///
    /// `kitchen-dashboard` 需要 Kitchen|Admin；`admin-dashboard` 仅 Admin。
    pub fn subscribe_dashboard(&self, conn_id: ConnectionId, name: &str) -> Result<Room, AppError> {
        let role = self
            .connections
            .get(&conn_id)
            .and_then(|e| e.claims.as_ref().and_then(|c| c.role));

        let room = match name {
            "kitchen-dashboard" => {
                if !matches!(role, Some(StaffRole::Kitchen) | Some(StaffRole::Admin)) {
                    return Err(AppError::forbidden(
                        "Kitchen dashboard requires kitchen or admin role",
                    ));
                }
                Room::KitchenDashboard
            }
            "admin-dashboard" => {
                if role != Some(StaffRole::Admin) {
                    return Err(AppError::forbidden("Admin dashboard requires admin role"));
                }
                Room::AdminDashboard
            }
            other => {
                return Err(AppError::validation(format!(
                    "Unknown dashboard: {}",
                    other
                )));
            }
        };

        self.join(conn_id, room.clone());
        Ok(room)
    }

    /// 连接断开：离开其持有的全部房间并移除连接
    ///
    /// 短暂掉线的宽限重连是传输层策略；重连后由适配层重跑
    /// authenticate + 订阅序列，注册表本身不保留任何断线状态。
    pub fn on_disconnect(&self, conn_id: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&conn_id) else {
            return;
        };
        for room in entry.rooms {
            self.remove_member(&room, conn_id);
        }
        tracing::debug!(connection = %conn_id, "Connection removed");
    }

    /// 向指定连接单发 (用于 ack)
    pub fn send_to(&self, conn_id: ConnectionId, msg: OutboundMessage) {
        if let Some(entry) = self.connections.get(&conn_id)
            && entry.sender.send(msg).is_err()
        {
            tracing::debug!(connection = %conn_id, "Send to closed connection dropped");
        }
    }

    /// 向房间广播 (fire-and-forget)，返回投递的连接数
    ///
    /// 空房间是静默 no-op；单个连接投递失败不影响其他成员。
    pub fn broadcast(&self, room: &Room, event: &str, payload: &Value) -> usize {
        // 快照成员并立刻释放房间锁
        let members: Vec<ConnectionId> = match self.rooms.get(room) {
            Some(set) => set.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for conn_id in members {
            if let Some(entry) = self.connections.get(&conn_id) {
                let msg = OutboundMessage::new(event, payload.clone());
                if entry.sender.send(msg).is_ok() {
                    delivered += 1;
                } else {
                    tracing::debug!(connection = %conn_id, room = %room, "Dead connection skipped");
                }
            }
        }
        delivered
    }

    /// 向所有连接广播 (菜品 86 / 紧急告警专用)
    pub fn broadcast_all(&self, event: &str, payload: &Value) -> usize {
        let mut delivered = 0;
        for entry in self.connections.iter() {
            let msg = OutboundMessage::new(event, payload.clone());
            if entry.sender.send(msg).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// 在线连接数
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 非空房间数
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// 房间成员数 (测试与统计用)
    pub fn members_of(&self, room: &Room) -> usize {
        self.rooms.get(room).map(|s| s.len()).unwrap_or(0)
    }

    fn join(&self, conn_id: ConnectionId, room: Room) {
        // 先房间表后连接表，两把 entry 锁绝不同时持有
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(conn_id);
        match self.connections.get_mut(&conn_id) {
            Some(mut entry) => {
                entry.rooms.insert(room);
            }
            None => {
                // 连接已在加入过程中断开，回滚房间表
                self.remove_member(&room, conn_id);
            }
        }
    }

    fn leave(&self, conn_id: ConnectionId, room: &Room) {
        self.remove_member(room, conn_id);
        if let Some(mut entry) = self.connections.get_mut(&conn_id) {
            entry.rooms.remove(room);
        }
    }

    fn remove_member(&self, room: &Room, conn_id: ConnectionId) {
        if let Some(mut set) = self.rooms.get_mut(room) {
            set.remove(&conn_id);
            if set.is_empty() {
                drop(set);
                self.rooms.remove_if(room, |_, s| s.is_empty());
            }
        }
    }
}
