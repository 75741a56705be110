//! 会话生命周期状态机
//!
//! ```text
//! UNVERIFIED_ACTIVE ──verify──► VERIFIED_ACTIVE ──end/force-end/expiry──► ENDED
//!        │                                                                 ▲
//!        └──────────── 验证次数耗尽 / 过期 / 同桌新会话 ─────────────────────┘
//! ```
//!
//! 过期是懒检测条件（`now > expires_at`），不是存储状态。
//!
//! ## 并发纪律
//!
//! 验证的「先递增后比较」序列必须按 sessionId 原子执行，否则两个并发验证
//! 可能同时观察到剩余次数 > 0 而突破上限。这里用 per-session 互斥锁表
//! 串行化同一会话的全部变更操作；清扫与 Verify/Extend 并发时，后完成方的
//! `is_active` 前置检查自然失败。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use super::code::generate_security_code;
use super::model::TableSession;
use super::store::SessionStore;
use crate::security_log;
use crate::tables::TableDirectory;
use crate::utils::AppError;

/// 会话策略配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 初始有效期（小时）
    pub ttl_hours: i64,
    /// 验证次数上限
    pub max_verification_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 2,
            max_verification_attempts: 3,
        }
    }
}

/// 会话统计
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub active_sessions: u64,
    pub sessions_today: u64,
}

/// 会话生命周期服务
///
/// 所有顾客侧变更（下单、查账）都必须先通过 [`validate_active`]
/// (SessionLifecycle::validate_active) 这一收口点。
pub struct SessionLifecycle {
    store: Arc<dyn SessionStore>,
    tables: Arc<dyn TableDirectory>,
    config: SessionConfig,
    /// per-session 变更锁表
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLifecycle {
    pub fn new(
        store: Arc<dyn SessionStore>,
        tables: Arc<dyn TableDirectory>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            tables,
            config,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 创建新会话 (员工操作)
    ///
    /// 返回会话和明文安全码；明文码只在这里暴露一次，由员工当面转告顾客。
    ///
    /// 副作用：先失活同桌的其余活跃会话，保证单桌单活跃会话不变量。
    pub async fn create(
        &self,
        table_id: &str,
        device_id: &str,
        created_by: &str,
    ) -> Result<(TableSession, String), AppError> {
        // 桌台必须存在且不在维护中
        self.tables.validate_table_for_session(table_id).await?;

        // 设备绑定：一台设备同时只能持有一个活跃会话
        if self
            .store
            .find_active_by_device(device_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "Device already has an active session",
            ));
        }

        let now = Utc::now();
        let deactivated = self.store.deactivate_all_for_table(table_id, now).await?;
        if deactivated > 0 {
            tracing::info!(
                table_id = %table_id,
                count = deactivated,
                "Deactivated prior active sessions for table"
            );
        }

        let code = generate_security_code();
        let session = TableSession::new(
            table_id,
            device_id,
            created_by,
            &code,
            self.config.ttl_hours,
            self.config.max_verification_attempts,
        );
        let session = self.store.create(session).await?;

        security_log!(
            "INFO",
            "session_created",
            session_id = %session.session_id,
            table_id = %table_id,
            created_by = %created_by
        );

        Ok((session, code))
    }

    /// 验证安全码
    ///
    /// 递增发生在比较之前并先行落库：否则重复提交的竞态会绕过次数上限。
    /// 成功的那一次同样计入次数。
    pub async fn verify(
        &self,
        session_id: &str,
        submitted_code: &str,
    ) -> Result<TableSession, AppError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load(session_id).await?;
        let now = Utc::now();

        if !session.is_active {
            return Err(AppError::invalid_state("Session is not active"));
        }

        // 过期优先于一切验证状态检查，失败即失活
        if session.is_expired(now) {
            session.deactivate(now);
            self.store.update(&session).await?;
            return Err(AppError::expired("Session expired, please scan again"));
        }

        // 重复验证是错误，不是幂等成功
        if session.is_verified {
            return Err(AppError::invalid_state("Session already verified"));
        }

        // 次数已耗尽：强制失活（防暴力猜码）
        if session.verification_attempts >= session.max_verification_attempts {
            session.deactivate(now);
            self.store.update(&session).await?;
            security_log!(
                "WARN",
                "verification_exhausted",
                session_id = %session_id,
                attempts = session.verification_attempts
            );
            return Err(AppError::forbidden(
                "Verification attempts exhausted, session deactivated",
            ));
        }

        // 先递增并落库，再比较
        session.verification_attempts += 1;
        self.store.update(&session).await?;

        if session.security_code != submitted_code {
            if session.remaining_attempts() == 0 {
                session.deactivate(now);
                self.store.update(&session).await?;
                security_log!(
                    "WARN",
                    "verification_exhausted",
                    session_id = %session_id,
                    attempts = session.verification_attempts
                );
                return Err(AppError::forbidden(
                    "Verification attempts exhausted, session deactivated",
                ));
            }
            return Err(AppError::unauthorized(format!(
                "Invalid security code. {} attempts remaining",
                session.remaining_attempts()
            )));
        }

        session.is_verified = true;
        session.verified_at = Some(now);
        let session = self.store.update(&session).await?;

        security_log!("INFO", "session_verified", session_id = %session_id);

        Ok(session)
    }

    /// 校验会话可用 (顾客侧所有变更的收口点)
    pub async fn validate_active(&self, session_id: &str) -> Result<TableSession, AppError> {
        let mut session = self.load(session_id).await?;
        let now = Utc::now();

        if session.is_expired(now) {
            if session.is_active {
                session.deactivate(now);
                self.store.update(&session).await?;
            }
            return Err(AppError::expired("Session expired, please scan again"));
        }

        if !session.is_active || !session.is_verified {
            return Err(AppError::unauthorized(
                "Session is not active and verified",
            ));
        }

        Ok(session)
    }

    /// 结束会话 (顾客或账单关闭触发)
    pub async fn end(&self, session_id: &str) -> Result<TableSession, AppError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load(session_id).await?;
        if !session.is_active {
            return Err(AppError::invalid_state("Session already ended"));
        }

        session.deactivate(Utc::now());
        let session = self.store.update(&session).await?;
        tracing::info!(session_id = %session_id, "Session ended");
        Ok(session)
    }

    /// 强制结束会话 (员工操作，记录审计原因)
    pub async fn force_end(
        &self,
        session_id: &str,
        reason: &str,
        actor: &str,
    ) -> Result<TableSession, AppError> {
        let session = self.end(session_id).await?;
        security_log!(
            "WARN",
            "session_force_ended",
            session_id = %session_id,
            actor = %actor,
            reason = %reason
        );
        Ok(session)
    }

    /// 延长会话有效期
    ///
    /// 仅限已验证的活跃会话；上限为创建起 8 小时，恰好触及上限是允许的。
    pub async fn extend(
        &self,
        session_id: &str,
        additional_hours: i64,
    ) -> Result<TableSession, AppError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load(session_id).await?;
        let now = Utc::now();

        if session.is_expired(now) {
            session.deactivate(now);
            self.store.update(&session).await?;
            return Err(AppError::expired("Session expired, please scan again"));
        }

        if !session.is_active || !session.is_verified {
            return Err(AppError::unauthorized(
                "Session is not active and verified",
            ));
        }

        let new_expiry = session.expires_at + Duration::hours(additional_hours);
        if new_expiry > session.max_expiry() {
            return Err(AppError::invalid_state(
                "Cannot extend beyond 8 hours from creation",
            ));
        }

        session.expires_at = new_expiry;
        let session = self.store.update(&session).await?;
        tracing::info!(
            session_id = %session_id,
            hours = additional_hours,
            "Session extended"
        );
        Ok(session)
    }

    /// 转台
    ///
    /// 只改会话上的 `table_id`；新旧桌台的占用状态切换和转台广播由调用方负责。
    pub async fn transfer(
        &self,
        session_id: &str,
        new_table_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<TableSession, AppError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load(session_id).await?;
        if !session.is_active {
            return Err(AppError::invalid_state("Session is not active"));
        }

        self.tables
            .get_table_by_id(new_table_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Table {} not found", new_table_id)))?;

        if let Some(other) = self.store.find_active_by_table(new_table_id).await?
            && other.session_id != session.session_id
        {
            return Err(AppError::conflict(format!(
                "Table {} already has an active session",
                new_table_id
            )));
        }

        session.table_id = new_table_id.to_string();
        let session = self.store.update(&session).await?;

        security_log!(
            "INFO",
            "session_transferred",
            session_id = %session_id,
            new_table_id = %new_table_id,
            actor = %actor,
            reason = %reason
        );

        Ok(session)
    }

    /// 清扫过期会话，返回失活数量
    ///
    /// 幂等；可与自身及 Verify/Extend 并发执行。
    pub async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let count = self.store.bulk_deactivate_expired(Utc::now()).await?;
        if count > 0 {
            tracing::info!(count, "Expired sessions deactivated");
        }
        Ok(count)
    }

    /// 重新生成安全码 (员工操作)
    ///
    /// 仅限未验证的活跃会话；重置验证次数，不改变 `expires_at`。
    pub async fn regenerate_security_code(
        &self,
        session_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<String, AppError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load(session_id).await?;
        let now = Utc::now();

        if session.is_expired(now) {
            session.deactivate(now);
            self.store.update(&session).await?;
            return Err(AppError::expired("Session expired, please scan again"));
        }

        if !session.is_active || session.is_verified {
            return Err(AppError::invalid_state(
                "Security code can only be regenerated for active unverified sessions",
            ));
        }

        let code = generate_security_code();
        session.security_code = code.clone();
        session.verification_attempts = 0;
        self.store.update(&session).await?;

        security_log!(
            "INFO",
            "security_code_regenerated",
            session_id = %session_id,
            actor = %actor,
            reason = %reason
        );

        Ok(code)
    }

    /// 会话统计
    pub async fn stats(&self) -> Result<SessionStats, AppError> {
        let now = Utc::now();
        let start_of_day = now - Duration::hours(24);
        let active_sessions = self.store.count_active().await?;
        let sessions_today = self
            .store
            .find_by_date_range(start_of_day, now)
            .await?
            .len() as u64;
        Ok(SessionStats {
            active_sessions,
            sessions_today,
        })
    }

    /// 读取会话 (员工查询)
    pub async fn get(&self, session_id: &str) -> Result<TableSession, AppError> {
        self.load(session_id).await
    }

    async fn load(&self, session_id: &str) -> Result<TableSession, AppError> {
        self.store
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Session {} not found", session_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::store::MemorySessionStore;
    use crate::tables::{MemoryTableDirectory, TableRecord};
    use shared::TableStatus;

    fn table(id: &str, status: TableStatus) -> TableRecord {
        TableRecord {
            table_id: id.to_string(),
            name: format!("Table {}", id),
            status,
        }
    }

    fn lifecycle() -> (SessionLifecycle, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let tables = Arc::new(MemoryTableDirectory::with_tables([
            table("TBL00001", TableStatus::Available),
            table("TBL00002", TableStatus::Available),
            table("TBL00003", TableStatus::Maintenance),
        ]));
        (
            SessionLifecycle::new(store.clone(), tables, SessionConfig::default()),
            store,
        )
    }

    async fn force_expire(store: &MemorySessionStore, session_id: &str) {
        let mut s = store.find_by_id(session_id).await.unwrap().unwrap();
        s.expires_at = Utc::now() - Duration::minutes(1);
        store.update(&s).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_returns_six_digit_code() {
        let (lifecycle, _) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(session.is_active);
        assert!(!session.is_verified);
    }

    #[tokio::test]
    async fn test_create_rejects_maintenance_table() {
        let (lifecycle, _) = lifecycle();
        let err = lifecycle
            .create("TBL00003", "device-1", "staff-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_device_with_active_session() {
        let (lifecycle, _) = lifecycle();
        lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        let err = lifecycle
            .create("TBL00002", "device-1", "staff-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_single_active_session_per_table() {
        // second create for the same table deactivates the first
        let (lifecycle, store) = lifecycle();
        let (first, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        let (second, code) = lifecycle
            .create("TBL00001", "device-2", "staff-1")
            .await
            .unwrap();

        let first = store.find_by_id(&first.session_id).await.unwrap().unwrap();
        assert!(!first.is_active);
        assert!(first.ended_at.is_some());

        // only the verified second session passes validate_active
        lifecycle.verify(&second.session_id, &code).await.unwrap();
        assert!(lifecycle.validate_active(&second.session_id).await.is_ok());
        assert!(
            lifecycle
                .validate_active(&first.session_id)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_verify_success_counts_attempt() {
        let (lifecycle, _) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        let verified = lifecycle.verify(&session.session_id, &code).await.unwrap();
        assert!(verified.is_verified);
        assert!(verified.verified_at.is_some());
        // the successful attempt is counted too
        assert_eq!(verified.verification_attempts, 1);
    }

    #[tokio::test]
    async fn test_verify_wrong_code_reports_remaining() {
        let (lifecycle, _) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = lifecycle
            .verify(&session.session_id, wrong)
            .await
            .unwrap_err();
        match err {
            AppError::Unauthorized(msg) => assert!(msg.contains("2 attempts remaining")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_attempt_exhaustion_deactivates() {
        // three wrong attempts with max=3
        let (lifecycle, store) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let e1 = lifecycle
            .verify(&session.session_id, wrong)
            .await
            .unwrap_err();
        assert!(matches!(e1, AppError::Unauthorized(_)));

        let e2 = lifecycle
            .verify(&session.session_id, wrong)
            .await
            .unwrap_err();
        assert!(matches!(e2, AppError::Unauthorized(_)));

        // third wrong attempt exhausts the budget and deactivates
        let e3 = lifecycle
            .verify(&session.session_id, wrong)
            .await
            .unwrap_err();
        assert!(matches!(e3, AppError::Forbidden(_)));

        let stored = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.verification_attempts, 3);

        // a fourth attempt with the RIGHT code fails: the session is inactive
        let e4 = lifecycle
            .verify(&session.session_id, &code)
            .await
            .unwrap_err();
        assert!(matches!(e4, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_verify_already_verified_rejected() {
        // verification is monotonic; re-verification is an error
        let (lifecycle, store) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        lifecycle.verify(&session.session_id, &code).await.unwrap();
        let err = lifecycle
            .verify(&session.session_id, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let stored = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_verified);
    }

    #[tokio::test]
    async fn test_expiry_precedes_verification_checks() {
        // expiry wins regardless of remaining attempts
        let (lifecycle, store) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        force_expire(&store, &session.session_id).await;

        let err = lifecycle
            .verify(&session.session_id, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));

        let stored = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn test_validate_active_lazy_expiry() {
        let (lifecycle, store) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        lifecycle.verify(&session.session_id, &code).await.unwrap();
        assert!(lifecycle.validate_active(&session.session_id).await.is_ok());

        force_expire(&store, &session.session_id).await;
        let err = lifecycle
            .validate_active(&session.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));

        let stored = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn test_validate_active_rejects_unverified() {
        let (lifecycle, _) = lifecycle();
        let (session, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        let err = lifecycle
            .validate_active(&session.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_end_twice_is_invalid_state() {
        let (lifecycle, _) = lifecycle();
        let (session, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        lifecycle.end(&session.session_id).await.unwrap();
        let err = lifecycle.end(&session.session_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_extend_eight_hour_ceiling() {
        // 7h elapsed-equivalent expiry; +2h fails, +1h hits the
        // inclusive boundary and succeeds
        let (lifecycle, store) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        lifecycle.verify(&session.session_id, &code).await.unwrap();

        // simulate a session whose expiry already sits at created_at + 7h
        let mut s = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        s.expires_at = s.created_at + Duration::hours(7);
        store.update(&s).await.unwrap();

        let err = lifecycle.extend(&session.session_id, 2).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let extended = lifecycle.extend(&session.session_id, 1).await.unwrap();
        assert_eq!(extended.expires_at, extended.created_at + Duration::hours(8));
    }

    #[tokio::test]
    async fn test_extend_requires_verified(){
        let (lifecycle, _) = lifecycle();
        let (session, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        let err = lifecycle.extend(&session.session_id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_transfer_to_occupied_table_conflicts() {
        let (lifecycle, _) = lifecycle();
        let (a, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        lifecycle
            .create("TBL00002", "device-2", "staff-1")
            .await
            .unwrap();

        let err = lifecycle
            .transfer(&a.session_id, "TBL00002", "staff-1", "customer request")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_transfer_reassigns_table() {
        let (lifecycle, _) = lifecycle();
        let (session, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();

        let moved = lifecycle
            .transfer(&session.session_id, "TBL00002", "staff-1", "draft near window")
            .await
            .unwrap();
        assert_eq!(moved.table_id, "TBL00002");
        assert!(moved.is_active);
    }

    #[tokio::test]
    async fn test_regenerate_resets_attempts_keeps_expiry() {
        let (lifecycle, store) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };
        let _ = lifecycle.verify(&session.session_id, wrong).await;

        let before = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.verification_attempts, 1);

        let new_code = lifecycle
            .regenerate_security_code(&session.session_id, "staff-1", "customer lost code")
            .await
            .unwrap();

        let after = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.verification_attempts, 0);
        assert_eq!(after.security_code, new_code);
        assert_eq!(after.expires_at, before.expires_at);

        // fresh budget: the new code verifies
        lifecycle
            .verify(&session.session_id, &new_code)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_regenerate_rejected_after_verification() {
        let (lifecycle, _) = lifecycle();
        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        lifecycle.verify(&session.session_id, &code).await.unwrap();

        let err = lifecycle
            .regenerate_security_code(&session.session_id, "staff-1", "oops")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_cleanup_expired_idempotent() {
        let (lifecycle, store) = lifecycle();
        let (a, _) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        lifecycle
            .create("TBL00002", "device-2", "staff-1")
            .await
            .unwrap();
        force_expire(&store, &a.session_id).await;

        assert_eq!(lifecycle.cleanup_expired().await.unwrap(), 1);
        assert_eq!(lifecycle.cleanup_expired().await.unwrap(), 0);
        assert_eq!(store.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_verifies_respect_attempt_bound() {
        // parallel wrong attempts never leave
        // attempts > max with the session still active
        let store = Arc::new(MemorySessionStore::new());
        let tables = Arc::new(MemoryTableDirectory::with_tables([table(
            "TBL00001",
            TableStatus::Available,
        )]));
        let lifecycle = Arc::new(SessionLifecycle::new(
            store.clone(),
            tables,
            SessionConfig::default(),
        ));

        let (session, code) = lifecycle
            .create("TBL00001", "device-1", "staff-1")
            .await
            .unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lifecycle = lifecycle.clone();
            let id = session.session_id.clone();
            let wrong = wrong.to_string();
            handles.push(tokio::spawn(async move {
                lifecycle.verify(&id, &wrong).await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let stored = store
            .find_by_id(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.verification_attempts <= stored.max_verification_attempts);
        assert!(!stored.is_active);
    }
}
