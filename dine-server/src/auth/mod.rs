//! 认证模块
//!
//! - [`JwtService`] - 令牌签发与校验（顾客会话令牌 + 员工令牌）
//! - [`CurrentStaff`] - 员工提取器（受保护接口使用）
//! - [`require_staff`] - 员工认证中间件

mod extractor;
mod jwt;
mod middleware;

pub use extractor::CurrentStaff;
pub use jwt::{JwtConfig, JwtError, JwtService, TokenClaims, TokenKind};
pub use middleware::require_staff;
