//! API 路由模块
//!
//! # 结构
//!
//! - [`sessions`] - 会话生命周期接口
//! - [`events`] - 领域事件扇出触发接口
//! - [`health`] - 健康检查
//! - `/ws` - WebSocket 实时连接入口

pub mod events;
pub mod health;
pub mod sessions;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;
use crate::realtime::ws::ws_handler;

/// 组装完整应用路由
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(sessions::router(&state))
        .merge(events::router(&state))
        .merge(health::router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
