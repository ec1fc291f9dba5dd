//! [`LockStore`] backed by PostgreSQL.

use async_trait::async_trait;
use reslock_core::error::{CoreError, CoreResult};
use reslock_core::reservation::{AcquireOutcome, LockKey, NewReservationLock, ReservationLock};
use reslock_core::store::LockStore;
use reslock_core::types::{DbId, Timestamp};

use crate::repositories::{AcquireResult, ReservationLockRepo};
use crate::DbPool;

/// Reservation lock store over a shared connection pool.
///
/// Every `sqlx` failure (connection, timeout, missing table) is reported as
/// [`CoreError::StorageUnavailable`] after being logged with the operation name.
#[derive(Clone)]
pub struct PgLockStore {
    pool: DbPool,
}

impl PgLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable(operation: &'static str) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Reservation lock storage failed");
        CoreError::StorageUnavailable(format!("{operation}: {e}"))
    }
}

#[async_trait]
impl LockStore for PgLockStore {
    async fn find_own_lock(
        &self,
        key: LockKey,
        session_id: &str,
    ) -> CoreResult<Option<ReservationLock>> {
        let row = ReservationLockRepo::find_own(&self.pool, key, session_id)
            .await
            .map_err(unavailable("find_own_lock"))?;
        Ok(row.map(Into::into))
    }

    async fn upsert(&self, lock: &NewReservationLock) -> CoreResult<ReservationLock> {
        let row = ReservationLockRepo::upsert(&self.pool, lock)
            .await
            .map_err(unavailable("upsert"))?;
        Ok(row.into())
    }

    async fn find_blocking_lock(
        &self,
        key: LockKey,
        exclude_session_id: &str,
        now: Timestamp,
    ) -> CoreResult<Option<ReservationLock>> {
        let row = ReservationLockRepo::find_blocking(&self.pool, key, exclude_session_id, now)
            .await
            .map_err(unavailable("find_blocking_lock"))?;
        Ok(row.map(Into::into))
    }

    async fn acquire(&self, lock: &NewReservationLock) -> CoreResult<AcquireOutcome> {
        let result = ReservationLockRepo::acquire(&self.pool, lock)
            .await
            .map_err(unavailable("acquire"))?;
        Ok(match result {
            AcquireResult::Acquired(row) => AcquireOutcome::Acquired(row.into()),
            AcquireResult::Blocked(row) => AcquireOutcome::Denied {
                blocked_until: row.expires_at,
            },
        })
    }

    async fn delete_by_owner(&self, user_id: Option<DbId>, session_id: &str) -> CoreResult<u64> {
        ReservationLockRepo::delete_by_owner(&self.pool, user_id, session_id)
            .await
            .map_err(unavailable("delete_by_owner"))
    }

    async fn delete_by_resource(&self, resource_id: DbId) -> CoreResult<u64> {
        ReservationLockRepo::delete_by_resource(&self.pool, resource_id)
            .await
            .map_err(unavailable("delete_by_resource"))
    }

    async fn delete_expired(&self, now: Timestamp) -> CoreResult<u64> {
        ReservationLockRepo::delete_expired(&self.pool, now)
            .await
            .map_err(unavailable("delete_expired"))
    }

    async fn list_active_by_resource(
        &self,
        resource_id: DbId,
        now: Timestamp,
    ) -> CoreResult<Vec<ReservationLock>> {
        let rows = ReservationLockRepo::list_active_by_resource(&self.pool, resource_id, now)
            .await
            .map_err(unavailable("list_active_by_resource"))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> CoreResult<()> {
        crate::health_check(&self.pool)
            .await
            .map_err(unavailable("ping"))
    }
}
