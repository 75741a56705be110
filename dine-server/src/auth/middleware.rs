//! 认证中间件
//!
//! 为员工接口提供 Axum 中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{CurrentStaff, JwtService};
use crate::core::ServerState;
use crate::security_log;
use crate::utils::AppError;

/// 员工认证中间件
///
/// 从 `Authorization: Bearer <token>` 头提取并验证员工令牌。
/// 验证成功后将 [`CurrentStaff`] 注入请求扩展。
///
/// # 错误处理
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 无 Authorization 头 | 401 Unauthorized |
/// | 令牌过期 | 401 Unauthorized |
/// | 顾客会话令牌访问员工接口 | 403 Forbidden |
pub async fn require_staff(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 允许 CORS 预检的 OPTIONS 请求 (跳过认证)
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .ok_or_else(|| AppError::unauthorized("Invalid authorization header"))?,
        None => {
            security_log!("WARN", "auth_missing", uri = format!("{:?}", req.uri()));
            return Err(AppError::unauthorized("Authentication required"));
        }
    };

    // 验证令牌
    match state.jwt_service.verify_token(token) {
        Ok(claims) => {
            let staff = CurrentStaff::try_from(claims)?;
            req.extensions_mut().insert(staff);
            Ok(next.run(req).await)
        }
        Err(e) => {
            security_log!(
                "WARN",
                "auth_failed",
                error = format!("{}", e),
                uri = format!("{:?}", req.uri())
            );
            match e {
                crate::auth::JwtError::ExpiredToken => Err(AppError::unauthorized("Token expired")),
                _ => Err(AppError::unauthorized("Invalid token")),
            }
        }
    }
}
