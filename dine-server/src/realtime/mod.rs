//! 实时层 - 房间化事件扇出
//!
//! ```text
//! 域服务 (orders/bills/tables)
//!        │ DomainEvent
//!        ▼
//!   EventRouter ── route() 纯函数：事件 → [(房间, 事件名, payload)]
//!        │
//!        ▼
//! ConnectionManager ── 房间注册表 + 连接表，fire-and-forget 广播
//!        │
//!        ▼
//!   WebSocket 连接 (axum ws 适配层)
//! ```
//!
//! 投递语义：best-effort、at-most-once；不持久化、不重试、不跨房间排序。

pub mod connection;
pub mod room;
pub mod router;
pub mod ws;

pub use connection::{
    ClientKind, ConnectionClaims, ConnectionId, ConnectionManager, OutboundMessage,
};
pub use room::Room;
pub use router::{Emit, EventRouter, Target, route};
