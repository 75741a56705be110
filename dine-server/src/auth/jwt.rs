//! JWT 令牌服务
//!
//! 签发和校验两类令牌：
//!
//! - **会话令牌** (`token_type = "session"`)：会话验证成功后发给顾客设备，
//!   携带 sessionId/tableId/deviceId，过期时间与会话一致。
//! - **员工令牌** (`token_type = "staff"`)：携带 userId/role，
//!   员工连接据此加入角色房间。

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use shared::StaffRole;
use thiserror::Error;

use crate::sessions::TableSession;

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// JWT 密钥 (应至少 32 字节)
    pub secret: String,
    /// 员工令牌过期时间 (分钟)
    pub staff_expiration_minutes: i64,
    /// 令牌签发者
    pub issuer: String,
    /// 令牌受众
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: load_jwt_secret(),
            staff_expiration_minutes: std::env::var("JWT_STAFF_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1440), // 默认 24 小时
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dine-server".to_string()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dine-clients".to_string()),
        }
    }
}

/// 从环境变量安全地加载 JWT 密钥
///
/// 生产构建中缺失或过短的密钥直接 panic；开发构建生成临时密钥。
fn load_jwt_secret() -> String {
    match std::env::var("JWT_SECRET") {
        Ok(secret) if secret.len() >= 32 => secret,
        Ok(_) => {
            #[cfg(debug_assertions)]
            {
                tracing::warn!("JWT_SECRET too short, generating temporary development key");
                generate_printable_secret()
            }
            #[cfg(not(debug_assertions))]
            {
                panic!("JWT_SECRET must be at least 32 characters long");
            }
        }
        Err(_) => {
            #[cfg(debug_assertions)]
            {
                tracing::warn!("⚠️  JWT_SECRET not set! Generating temporary development key.");
                generate_printable_secret()
            }
            #[cfg(not(debug_assertions))]
            {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        }
    }
}

/// 生成可打印的安全密钥 (用于开发环境)
fn generate_printable_secret() -> String {
    let allowed_chars =
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

    let rng = SystemRandom::new();
    let mut key = String::with_capacity(64);

    for _ in 0..64 {
        let mut byte = [0u8; 1];
        if rng.fill(&mut byte).is_err() {
            // 随机数生成失败时退回固定开发密钥
            return "DineLinkDevelopmentOnlySecureKey2026!".to_string();
        }
        let idx = (byte[0] as usize) % allowed_chars.len();
        key.push(allowed_chars.as_bytes()[idx] as char);
    }

    key
}

/// 令牌类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// 顾客会话令牌
    Session,
    /// 员工令牌
    Staff,
}

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: 会话令牌为 sessionId，员工令牌为 userId
    pub sub: String,
    /// 令牌类型
    pub token_type: TokenKind,
    /// 会话 ID (仅会话令牌)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// 桌台 ID (仅会话令牌)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    /// 设备 ID (仅会话令牌)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// 员工 ID (仅员工令牌)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 员工角色 (仅员工令牌)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<StaffRole>,
    /// 过期时间戳
    pub exp: i64,
    /// 签发时间戳
    pub iat: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("无效令牌: {0}")]
    InvalidToken(String),

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("无效签名")]
    InvalidSignature,

    #[error("令牌生成失败: {0}")]
    GenerationFailed(String),
}

/// JWT 令牌服务
#[derive(Debug, Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// 使用默认配置创建新的 JWT 服务
    pub fn new() -> Self {
        Self::with_config(JwtConfig::default())
    }

    /// 使用指定配置创建新的 JWT 服务
    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 为已验证的会话签发顾客令牌
    ///
    /// 令牌过期时间与会话 `expires_at` 对齐，会话延长后需重新签发。
    pub fn issue_session_token(&self, session: &TableSession) -> Result<String, JwtError> {
        let now = Utc::now();

        let claims = TokenClaims {
            sub: session.session_id.clone(),
            token_type: TokenKind::Session,
            session_id: Some(session.session_id.clone()),
            table_id: Some(session.table_id.clone()),
            device_id: Some(session.device_id.clone()),
            user_id: None,
            role: None,
            exp: session.expires_at.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 为员工签发令牌
    pub fn issue_staff_token(&self, user_id: &str, role: StaffRole) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.staff_expiration_minutes);

        let claims = TokenClaims {
            sub: user_id.to_string(),
            token_type: TokenKind::Staff,
            session_id: None,
            table_id: None,
            device_id: None,
            user_id: Some(user_id.to_string()),
            role: Some(role),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 验证并解码令牌
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data =
            decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                    ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                    ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
                    _ => JwtError::InvalidToken(format!("Token validation failed: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

impl Default for JwtService {
    fn default() -> Self {
        Self::new()
    }
}
