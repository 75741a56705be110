//! 桌台会话模块
//!
//! 会话是下单/查账的唯一授权边界：设备绑定、限时、需安全码验证。
//!
//! - [`TableSession`] - 会话实体
//! - [`SessionStore`] - 会话存储抽象 + 内存实现
//! - [`SessionLifecycle`] - 会话状态机（创建/验证/延长/转台/终止/清扫）

pub mod code;
pub mod lifecycle;
pub mod model;
pub mod store;

pub use code::generate_security_code;
pub use lifecycle::{SessionConfig, SessionLifecycle, SessionStats};
pub use model::TableSession;
pub use store::{MemorySessionStore, SessionStore};
