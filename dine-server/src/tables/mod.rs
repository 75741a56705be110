//! 桌台目录 - 外部协作者接口
//!
//! 会话子系统只消费桌台服务的这几个操作；桌台 CRUD 本身属于外部系统。
//! 内存实现用于单进程部署和测试。

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shared::TableStatus;

use crate::utils::AppError;

/// 桌台记录快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub table_id: String,
    pub name: String,
    pub status: TableStatus,
}

/// 桌台目录接口
#[async_trait]
pub trait TableDirectory: Send + Sync {
    async fn get_table_by_id(&self, table_id: &str) -> Result<Option<TableRecord>, AppError>;

    /// 校验桌台可开会话：存在且不在维护中
    async fn validate_table_for_session(&self, table_id: &str) -> Result<TableRecord, AppError>;

    async fn mark_occupied(&self, table_id: &str) -> Result<(), AppError>;

    async fn mark_available(&self, table_id: &str) -> Result<(), AppError>;
}

/// 内存桌台目录
#[derive(Debug, Default)]
pub struct MemoryTableDirectory {
    tables: DashMap<String, TableRecord>,
}

impl MemoryTableDirectory {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// 预置桌台（启动时从配置或外部系统加载）
    pub fn with_tables(tables: impl IntoIterator<Item = TableRecord>) -> Self {
        let map = DashMap::new();
        for table in tables {
            map.insert(table.table_id.clone(), table);
        }
        Self { tables: map }
    }

    pub fn insert(&self, table: TableRecord) {
        self.tables.insert(table.table_id.clone(), table);
    }

    fn set_status(&self, table_id: &str, status: TableStatus) -> Result<(), AppError> {
        let mut entry = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| AppError::not_found(format!("Table {} not found", table_id)))?;
        entry.status = status;
        Ok(())
    }
}

#[async_trait]
impl TableDirectory for MemoryTableDirectory {
    async fn get_table_by_id(&self, table_id: &str) -> Result<Option<TableRecord>, AppError> {
        Ok(self.tables.get(table_id).map(|t| t.clone()))
    }

    async fn validate_table_for_session(&self, table_id: &str) -> Result<TableRecord, AppError> {
        let table = self
            .tables
            .get(table_id)
            .map(|t| t.clone())
            .ok_or_else(|| AppError::not_found(format!("Table {} not found", table_id)))?;

        if table.status == TableStatus::Maintenance {
            return Err(AppError::forbidden(format!(
                "Table {} is under maintenance",
                table_id
            )));
        }

        Ok(table)
    }

    async fn mark_occupied(&self, table_id: &str) -> Result<(), AppError> {
        self.set_status(table_id, TableStatus::Occupied)
    }

    async fn mark_available(&self, table_id: &str) -> Result<(), AppError> {
        self.set_status(table_id, TableStatus::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str, status: TableStatus) -> TableRecord {
        TableRecord {
            table_id: id.to_string(),
            name: format!("Table {}", id),
            status,
        }
    }

    #[tokio::test]
    async fn test_maintenance_table_rejected() {
        let dir = MemoryTableDirectory::with_tables([
            table("T1", TableStatus::Available),
            table("T2", TableStatus::Maintenance),
        ]);

        assert!(dir.validate_table_for_session("T1").await.is_ok());

        let err = dir.validate_table_for_session("T2").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = dir.validate_table_for_session("T9").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_occupancy_toggle() {
        let dir = MemoryTableDirectory::with_tables([table("T1", TableStatus::Available)]);
        dir.mark_occupied("T1").await.unwrap();
        assert_eq!(
            dir.get_table_by_id("T1").await.unwrap().unwrap().status,
            TableStatus::Occupied
        );
        dir.mark_available("T1").await.unwrap();
        assert_eq!(
            dir.get_table_by_id("T1").await.unwrap().unwrap().status,
            TableStatus::Available
        );
    }
}
