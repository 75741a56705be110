//! DineLink Server - 扫码点餐实时服务端
//!
//! # 架构概述
//!
//! 本模块是 DineLink 服务端的主入口，提供以下核心功能：
//!
//! - **桌台会话** (`sessions`): 设备绑定、限时、需验证的桌台会话状态机
//! - **实时层** (`realtime`): 房间注册、连接管理、领域事件扇出
//! - **认证** (`auth`): JWT 令牌（顾客会话令牌 + 员工令牌）
//! - **HTTP API** (`api`): 会话管理与事件触发接口
//!
//! # 模块结构
//!
//! ```text
//! dine-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── auth/          # JWT 认证、提取器、中间件
//! ├── sessions/      # 会话模型、安全码、存储、生命周期
//! ├── tables/        # 桌台目录（外部协作者接口）
//! ├── realtime/      # 房间、连接管理、事件路由、WebSocket
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod realtime;
pub mod sessions;
pub mod tables;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentStaff, JwtService, TokenClaims};
pub use core::{Config, Server, ServerState};
pub use realtime::{ConnectionManager, EventRouter, Room};
pub use sessions::{SessionLifecycle, SessionStore, TableSession};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 字段原样透传给 tracing (支持 % 和 ? 格式说明符)
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr) => {
        tracing::info!(target: "security", level = $level, event = $event);
    };
    ($level:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($fields)*
        );
    };
}
