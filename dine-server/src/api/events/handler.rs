//! Event API Handlers

use axum::{Json, extract::State};
use serde::Serialize;
use shared::DomainEvent;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitResponse {
    /// 投递到的连接总数 (跨房间合计)
    pub delivered: usize,
}

/// POST /api/events/emit - 扇出一个领域事件
///
/// 订单接受时的 `estimatedMinutes` 在这里做最终校验。
pub async fn emit(
    State(state): State<ServerState>,
    Json(event): Json<DomainEvent>,
) -> AppResult<Json<EmitResponse>> {
    if let DomainEvent::OrderAccepted {
        estimated_minutes, ..
    } = &event
        && !(1..=180).contains(estimated_minutes)
    {
        return Err(AppError::validation(
            "estimatedMinutes must be between 1 and 180",
        ));
    }

    let delivered = state.events.publish(&event);
    Ok(Json(EmitResponse { delivered }))
}
