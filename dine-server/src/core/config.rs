use crate::auth::JwtConfig;
use crate::sessions::SessionConfig;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | SESSION_TTL_HOURS | 2 | 会话初始有效期（小时） |
/// | SESSION_MAX_ATTEMPTS | 3 | 安全码验证次数上限 |
/// | SESSION_SWEEP_INTERVAL_SECS | 60 | 过期会话清扫间隔（秒） |
/// | TABLE_COUNT | 20 | 启动时预置的桌台数量 |
/// | LOG_DIR | (无) | 日志文件目录，未设置则仅输出到控制台 |
/// | JWT_SECRET | (开发环境自动生成) | JWT 签名密钥 |
///
/// # 示例
///
/// ```ignore
/// HTTP_PORT=8080 SESSION_TTL_HOURS=3 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    /// 会话生命周期配置
    pub session: SessionConfig,
    /// 过期会话清扫间隔 (秒)
    pub sweep_interval_secs: u64,
    /// 启动时预置的桌台数量
    pub table_count: u32,
    /// 日志文件目录 (可选)
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            jwt: JwtConfig::default(),
            session: SessionConfig {
                ttl_hours: std::env::var("SESSION_TTL_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2),
                max_verification_attempts: std::env::var("SESSION_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
            },
            sweep_interval_secs: std::env::var("SESSION_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            table_count: std::env::var("TABLE_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
