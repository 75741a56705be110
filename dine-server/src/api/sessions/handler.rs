//! Session API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::DomainEvent;
use validator::Validate;

use crate::auth::CurrentStaff;
use crate::core::ServerState;
use crate::sessions::{SessionStats, TableSession};
use crate::utils::{AppError, AppResult};

/// POST /api/sessions 请求体
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 32))]
    pub table_id: String,
    #[validate(length(min = 1, max = 64))]
    pub device_id: String,
}

/// 开台响应：明文安全码只在此处出现一次
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session: TableSession,
    pub security_code: String,
}

/// POST /api/sessions/{id}/verify 请求体
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub session: TableSession,
    /// 顾客会话令牌，过期时间与会话一致
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<TableSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExtendRequest {
    #[validate(range(min = 1, max = 8))]
    pub additional_hours: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForceEndRequest {
    #[validate(length(min = 1, max = 256))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[validate(length(min = 1, max = 32))]
    pub new_table_id: String,
    #[validate(length(min = 1, max = 256))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegenerateRequest {
    #[validate(length(min = 1, max = 256))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateResponse {
    pub security_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub deactivated: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub sessions: SessionStats,
    pub connections: usize,
    pub rooms: usize,
}

/// POST /api/sessions - 开台
///
/// 副作用：桌台置为占用，向员工房间扇出 TableSessionStarted
/// （安全码只进前台接待房间）。
pub async fn create(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<Json<CreateSessionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let (session, code) = state
        .sessions
        .create(&payload.table_id, &payload.device_id, &staff.user_id)
        .await?;

    state.tables.mark_occupied(&payload.table_id).await?;

    state.events.publish(&DomainEvent::TableSessionStarted {
        session_id: session.session_id.clone(),
        table_id: session.table_id.clone(),
        security_code: code.clone(),
    });

    Ok(Json(CreateSessionResponse {
        session,
        security_code: code,
    }))
}

/// POST /api/sessions/:id/verify - 顾客提交安全码
pub async fn verify(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<VerifyRequest>,
) -> AppResult<Json<VerifyResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let session = state.sessions.verify(&id, &payload.code).await?;
    let token = state
        .jwt_service
        .issue_session_token(&session)
        .map_err(|e| AppError::internal(format!("Token generation failed: {}", e)))?;

    Ok(Json(VerifyResponse { session, token }))
}

/// GET /api/sessions/:id/validate - 只读可用性检查
///
/// 顾客端轮询用；不可用时返回 200 + 原因而非错误状态码。
/// 懒过期检测照常生效，过期会话在这里被失活。
pub async fn validate(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ValidateResponse>> {
    match state.sessions.validate_active(&id).await {
        Ok(session) => Ok(Json(ValidateResponse {
            valid: true,
            session: Some(session),
            reason: None,
        })),
        Err(e @ (AppError::Expired(_) | AppError::Unauthorized(_) | AppError::NotFound(_))) => {
            Ok(Json(ValidateResponse {
                valid: false,
                session: None,
                reason: Some(e.to_string()),
            }))
        }
        Err(e) => Err(e),
    }
}

/// GET /api/sessions/:id - 查询会话
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<TableSession>> {
    Ok(Json(state.sessions.get(&id).await?))
}

/// POST /api/sessions/:id/end - 结束会话
pub async fn end(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<TableSession>> {
    let session = state.sessions.end(&id).await?;

    state.tables.mark_available(&session.table_id).await?;
    state.events.publish(&DomainEvent::TableSessionEnded {
        session_id: session.session_id.clone(),
        table_id: session.table_id.clone(),
        reason: "ended".to_string(),
    });

    Ok(Json(session))
}

/// POST /api/sessions/:id/force-end - 员工强制结束 (审计原因)
pub async fn force_end(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<ForceEndRequest>,
) -> AppResult<Json<TableSession>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let session = state
        .sessions
        .force_end(&id, &payload.reason, &staff.user_id)
        .await?;

    state.tables.mark_available(&session.table_id).await?;
    state.events.publish(&DomainEvent::TableSessionEnded {
        session_id: session.session_id.clone(),
        table_id: session.table_id.clone(),
        reason: payload.reason,
    });

    Ok(Json(session))
}

/// POST /api/sessions/:id/extend - 延长有效期
///
/// 延长后 `expires_at` 变化，顾客令牌需通过 verify 之外的途径刷新；
/// 实践上顾客端继续用旧令牌到其原过期点，再走 validate 续期流程。
pub async fn extend(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ExtendRequest>,
) -> AppResult<Json<TableSession>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    Ok(Json(
        state.sessions.extend(&id, payload.additional_hours).await?,
    ))
}

/// POST /api/sessions/:id/transfer - 转台
///
/// 副作用：旧桌台置空闲、新桌台置占用，
/// 扇出 SessionTransferred 和两条 TableStatusChanged。
pub async fn transfer(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<TransferRequest>,
) -> AppResult<Json<TableSession>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let old_table_id = state.sessions.get(&id).await?.table_id;
    let session = state
        .sessions
        .transfer(&id, &payload.new_table_id, &staff.user_id, &payload.reason)
        .await?;

    state.tables.mark_available(&old_table_id).await?;
    state.tables.mark_occupied(&session.table_id).await?;

    state.events.publish(&DomainEvent::SessionTransferred {
        session_id: session.session_id.clone(),
        old_table_id: old_table_id.clone(),
        new_table_id: session.table_id.clone(),
    });
    state.events.publish(&DomainEvent::TableStatusChanged {
        table_id: old_table_id,
        new_status: shared::TableStatus::Available,
    });
    state.events.publish(&DomainEvent::TableStatusChanged {
        table_id: session.table_id.clone(),
        new_status: shared::TableStatus::Occupied,
    });

    Ok(Json(session))
}

/// POST /api/sessions/:id/regenerate-code - 重新生成安全码
///
/// 明文码只回给发起的员工，不进任何广播。
pub async fn regenerate_code(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<RegenerateRequest>,
) -> AppResult<Json<RegenerateResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let code = state
        .sessions
        .regenerate_security_code(&id, &staff.user_id, &payload.reason)
        .await?;

    Ok(Json(RegenerateResponse {
        security_code: code,
    }))
}

/// POST /api/sessions/cleanup - 手动触发过期清扫
pub async fn cleanup(State(state): State<ServerState>) -> AppResult<Json<CleanupResponse>> {
    let deactivated = state.sessions.cleanup_expired().await?;
    Ok(Json(CleanupResponse { deactivated }))
}

/// GET /api/sessions/stats - 会话与连接统计
pub async fn stats(State(state): State<ServerState>) -> AppResult<Json<StatsResponse>> {
    let sessions = state.sessions.stats().await?;
    Ok(Json(StatsResponse {
        sessions,
        connections: state.connections.connection_count(),
        rooms: state.connections.room_count(),
    }))
}
