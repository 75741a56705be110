//! 会话存储抽象
//!
//! 持久化技术不在本子系统范围内；[`SessionStore`] 定义生命周期需要的
//! 全部查询/变更操作，[`MemorySessionStore`] 提供单进程内存实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::model::TableSession;
use crate::utils::AppError;

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: TableSession) -> Result<TableSession, AppError>;

    async fn find_by_id(&self, session_id: &str) -> Result<Option<TableSession>, AppError>;

    async fn find_active_by_table(&self, table_id: &str)
    -> Result<Option<TableSession>, AppError>;

    async fn find_active_by_device(
        &self,
        device_id: &str,
    ) -> Result<Option<TableSession>, AppError>;

    /// 全量更新会话记录（以 session_id 定位）
    async fn update(&self, session: &TableSession) -> Result<TableSession, AppError>;

    /// 失活指定桌台的所有活跃会话，返回失活数量
    async fn deactivate_all_for_table(
        &self,
        table_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// 批量失活所有已过期的活跃会话，返回失活数量
    ///
    /// 必须逐条原子判定，并发调用不得重复计数。
    async fn bulk_deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    async fn count_active(&self) -> Result<u64, AppError>;

    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TableSession>, AppError>;
}

/// 内存会话存储
///
/// DashMap 的 entry 级锁保证单条记录的读改写原子性；
/// [`bulk_deactivate_expired`](SessionStore::bulk_deactivate_expired)
/// 在持锁状态下判定 + 失活，两个并发清扫不会对同一会话重复计数。
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, TableSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: TableSession) -> Result<TableSession, AppError> {
        if self.sessions.contains_key(&session.session_id) {
            return Err(AppError::conflict(format!(
                "Session {} already exists",
                session.session_id
            )));
        }
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, session_id: &str) -> Result<Option<TableSession>, AppError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn find_active_by_table(
        &self,
        table_id: &str,
    ) -> Result<Option<TableSession>, AppError> {
        Ok(self
            .sessions
            .iter()
            .find(|s| s.is_active && s.table_id == table_id)
            .map(|s| s.clone()))
    }

    async fn find_active_by_device(
        &self,
        device_id: &str,
    ) -> Result<Option<TableSession>, AppError> {
        Ok(self
            .sessions
            .iter()
            .find(|s| s.is_active && s.device_id == device_id)
            .map(|s| s.clone()))
    }

    async fn update(&self, session: &TableSession) -> Result<TableSession, AppError> {
        let mut entry = self.sessions.get_mut(&session.session_id).ok_or_else(|| {
            AppError::internal(format!(
                "Update for unknown session {}",
                session.session_id
            ))
        })?;
        *entry = session.clone();
        Ok(session.clone())
    }

    async fn deactivate_all_for_table(
        &self,
        table_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let ids: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.table_id == table_id)
            .map(|s| s.session_id.clone())
            .collect();

        let mut count = 0;
        for id in ids {
            if let Some(mut entry) = self.sessions.get_mut(&id)
                && entry.is_active
            {
                entry.deactivate(now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn bulk_deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let ids: Vec<String> = self
            .sessions
            .iter()
            .map(|s| s.session_id.clone())
            .collect();

        let mut count = 0;
        for id in ids {
            // 持 entry 锁判定 + 失活：并发清扫对同一会话只会计数一次
            if let Some(mut entry) = self.sessions.get_mut(&id)
                && entry.is_active
                && entry.is_expired(now)
            {
                entry.deactivate(now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_active(&self) -> Result<u64, AppError> {
        Ok(self.sessions.iter().filter(|s| s.is_active).count() as u64)
    }

    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TableSession>, AppError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.created_at >= from && s.created_at <= to)
            .map(|s| s.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn session(table: &str, device: &str) -> TableSession {
        TableSession::new(table, device, "staff-1", "123456", 2, 3)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemorySessionStore::new();
        let s = store.create(session("T1", "D1")).await.unwrap();

        assert!(store.find_by_id(&s.session_id).await.unwrap().is_some());
        assert!(store.find_active_by_table("T1").await.unwrap().is_some());
        assert!(store.find_active_by_device("D1").await.unwrap().is_some());
        assert!(store.find_active_by_table("T2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deactivate_all_for_table() {
        let store = MemorySessionStore::new();
        store.create(session("T1", "D1")).await.unwrap();
        store.create(session("T1", "D2")).await.unwrap();
        store.create(session("T2", "D3")).await.unwrap();

        let count = store
            .deactivate_all_for_table("T1", Utc::now())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(store.find_active_by_table("T1").await.unwrap().is_none());
        assert!(store.find_active_by_table("T2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_do_not_double_count() {
        // exactly 3 expired active sessions, two concurrent sweeps
        let store = Arc::new(MemorySessionStore::new());
        for i in 0..3 {
            let mut s = session("T1", &format!("D{}", i));
            s.session_id = format!("expired-{}", i);
            s.expires_at = Utc::now() - Duration::hours(1);
            store.create(s).await.unwrap();
        }
        let mut live = session("T9", "D9");
        live.session_id = "live".to_string();
        store.create(live).await.unwrap();

        let now = Utc::now();
        let a = tokio::spawn({
            let store = store.clone();
            async move { store.bulk_deactivate_expired(now).await.unwrap() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.bulk_deactivate_expired(now).await.unwrap() }
        });

        let total = a.await.unwrap() + b.await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(store.count_active().await.unwrap(), 1);
    }
}
