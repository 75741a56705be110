//! JWT Extractor
//!
//! Custom extractor for automatically validating staff tokens

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::StaffRole;

use crate::auth::{JwtService, TokenClaims, TokenKind};
use crate::core::ServerState;
use crate::security_log;
use crate::utils::AppError;

/// 当前员工上下文 (从 JWT Claims 解析)
///
/// 由认证中间件或提取器创建，注入到请求处理函数
#[derive(Debug, Clone)]
pub struct CurrentStaff {
    /// 员工 ID
    pub user_id: String,
    /// 角色
    pub role: StaffRole,
}

impl CurrentStaff {
    /// 是否管理员
    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Admin
    }
}

impl TryFrom<TokenClaims> for CurrentStaff {
    type Error = AppError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        if claims.token_type != TokenKind::Staff {
            return Err(AppError::forbidden("Staff token required"));
        }
        let role = claims
            .role
            .ok_or_else(|| AppError::unauthorized("Token missing role claim"))?;
        Ok(Self {
            user_id: claims.user_id.unwrap_or(claims.sub),
            role,
        })
    }
}

/// Staff Auth Extractor
///
/// Use this extractor in protected handlers to automatically validate the
/// bearer token and extract [`CurrentStaff`]
impl FromRequestParts<ServerState> for CurrentStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        // Check if already extracted (from middleware)
        if let Some(staff) = parts.extensions.get::<CurrentStaff>() {
            return Ok(staff.clone());
        }

        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match auth_header {
            Some(header) => JwtService::extract_from_header(header)
                .ok_or_else(|| AppError::unauthorized("Invalid authorization header"))?,
            None => {
                security_log!("WARN", "auth_missing", uri = format!("{:?}", parts.uri));
                return Err(AppError::unauthorized("Authentication required"));
            }
        };

        // Validate token
        match state.jwt_service.verify_token(token) {
            Ok(claims) => {
                let staff = CurrentStaff::try_from(claims)?;

                // Store in extensions for potential reuse
                parts.extensions.insert(staff.clone());

                Ok(staff)
            }
            Err(e) => {
                security_log!(
                    "WARN",
                    "auth_failed",
                    error = format!("{}", e),
                    uri = format!("{:?}", parts.uri)
                );

                match e {
                    crate::auth::JwtError::ExpiredToken => {
                        Err(AppError::unauthorized("Token expired"))
                    }
                    _ => Err(AppError::unauthorized("Invalid token")),
                }
            }
        }
    }
}
