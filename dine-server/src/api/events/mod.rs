//! Event API 模块
//!
//! 订单、账单等域服务通过这里把领域事件交给路由器扇出。

mod handler;

use axum::{Router, middleware, routing::post};

use crate::auth::require_staff;
use crate::core::ServerState;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new().nest("/api/events", routes(state))
}

fn routes(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .route("/emit", post(handler::emit))
        .layer(middleware::from_fn_with_state(state.clone(), require_staff))
}
