//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/health | GET | 健康检查 + 运行计数器 | 无 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::AppResult;

/// 健康检查路由 - 公共路由 (无需认证)
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 状态 (ok | error)
    status: &'static str,
    /// 版本号
    version: &'static str,
    /// 运行环境
    environment: String,
    /// 活跃会话数
    active_sessions: u64,
    /// 在线连接数
    connections: usize,
    /// 非空房间数
    rooms: usize,
}

/// GET /api/health
pub async fn health(State(state): State<ServerState>) -> AppResult<Json<HealthResponse>> {
    let stats = state.sessions.stats().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        active_sessions: stats.active_sessions,
        connections: state.connections.connection_count(),
        rooms: state.connections.room_count(),
    }))
}
