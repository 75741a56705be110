//! Session API 模块
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/sessions | POST | 开台 (返回明文安全码) | 员工 |
//! | /api/sessions/{id}/verify | POST | 验证安全码，签发顾客令牌 | 无 |
//! | /api/sessions/{id}/validate | GET | 只读可用性检查 | 无 |
//! | /api/sessions/{id} | GET | 查询会话 | 员工 |
//! | /api/sessions/{id}/end | POST | 结束会话 | 员工 |
//! | /api/sessions/{id}/force-end | POST | 强制结束 (审计原因) | 员工 |
//! | /api/sessions/{id}/extend | POST | 延长有效期 | 员工 |
//! | /api/sessions/{id}/transfer | POST | 转台 | 员工 |
//! | /api/sessions/{id}/regenerate-code | POST | 重新生成安全码 | 员工 |
//! | /api/sessions/cleanup | POST | 手动清扫过期会话 | 员工 |
//! | /api/sessions/stats | GET | 会话统计 | 员工 |

mod handler;

use axum::{Router, middleware, routing::get, routing::post};

use crate::auth::require_staff;
use crate::core::ServerState;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new().nest("/api/sessions", routes(state))
}

fn routes(state: &ServerState) -> Router<ServerState> {
    // 顾客侧：扫码后的验证与只读检查，无员工令牌
    let public_routes = Router::new()
        .route("/{id}/verify", post(handler::verify))
        .route("/{id}/validate", get(handler::validate));

    let staff_routes = Router::new()
        .route("/", post(handler::create))
        .route("/stats", get(handler::stats))
        .route("/cleanup", post(handler::cleanup))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/end", post(handler::end))
        .route("/{id}/force-end", post(handler::force_end))
        .route("/{id}/extend", post(handler::extend))
        .route("/{id}/transfer", post(handler::transfer))
        .route("/{id}/regenerate-code", post(handler::regenerate_code))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff));

    public_routes.merge(staff_routes)
}
