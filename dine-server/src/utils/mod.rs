//! 工具模块 - 错误类型与日志
//!
//! # 内容
//!
//! - [`AppError`] - 应用错误类型（会话/实时层统一错误分类）
//! - [`AppResponse`] - API 响应结构
//! - 日志初始化

pub mod error;
pub mod logger;

pub use error::{AppError, AppResponse, AppResult, ok};
