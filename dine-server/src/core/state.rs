use std::sync::Arc;

use shared::TableStatus;

use crate::auth::JwtService;
use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::realtime::{ConnectionManager, EventRouter};
use crate::sessions::{MemorySessionStore, SessionLifecycle, SessionStore};
use crate::tables::{MemoryTableDirectory, TableDirectory, TableRecord};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | store | 会话存储 |
/// | tables | 桌台目录协作者 |
/// | sessions | 会话生命周期服务 |
/// | connections | 连接/房间注册表 |
/// | events | 事件路由器 |
/// | jwt_service | JWT 令牌服务 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 会话存储
    pub store: Arc<dyn SessionStore>,
    /// 桌台目录
    pub tables: Arc<dyn TableDirectory>,
    /// 会话生命周期服务
    pub sessions: Arc<SessionLifecycle>,
    /// 连接管理器
    pub connections: Arc<ConnectionManager>,
    /// 事件路由器
    pub events: Arc<EventRouter>,
    /// JWT 认证服务
    pub jwt_service: Arc<JwtService>,
}

impl ServerState {
    /// 初始化所有服务
    ///
    /// 单进程内存部署：存储和桌台目录都是进程内实现，
    /// 桌台按 `TABLE_COUNT` 预置为 `TBL00001..`。
    pub fn initialize(config: &Config) -> Self {
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let tables: Arc<dyn TableDirectory> = Arc::new(MemoryTableDirectory::with_tables(
            (1..=config.table_count).map(|i| TableRecord {
                table_id: format!("TBL{:05}", i),
                name: format!("Table {}", i),
                status: TableStatus::Available,
            }),
        ));

        let sessions = Arc::new(SessionLifecycle::new(
            store.clone(),
            tables.clone(),
            config.session.clone(),
        ));
        let connections = Arc::new(ConnectionManager::new(jwt_service.clone()));
        let events = Arc::new(EventRouter::new(connections.clone()));

        Self {
            config: config.clone(),
            store,
            tables,
            sessions,
            connections,
            events,
            jwt_service,
        }
    }

    /// 启动后台任务，返回任务管理器供关停时使用
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let sessions = self.sessions.clone();
        let interval = std::time::Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let token = tasks.shutdown_token();
        tasks.spawn("session_sweeper", TaskKind::Periodic, async move {
            let mut ticker = tokio::time::interval(interval);
            // 跳过启动瞬间的第一跳
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sessions.cleanup_expired().await {
                            tracing::error!(error = %e, "Session sweep failed");
                        }
                    }
                }
            }
        });

        tasks.log_summary();
        tasks
    }
}
