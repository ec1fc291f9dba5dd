//! In-memory lock store.
//!
//! Single-process only: rows are lost on restart and are not shared between
//! processes. Used by tests and local development; production deployments
//! use the PostgreSQL store in `reslock-db`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::reservation::{AcquireOutcome, LockKey, NewReservationLock, ReservationLock};
use crate::store::LockStore;
use crate::types::{DbId, Timestamp};

#[derive(Debug, Default)]
struct Table {
    next_id: DbId,
    rows: HashMap<LockKey, Vec<ReservationLock>>,
}

impl Table {
    fn find_own(&self, key: LockKey, session_id: &str) -> Option<&ReservationLock> {
        self.rows
            .get(&key)
            .and_then(|rows| rows.iter().find(|r| r.session_id == session_id))
    }

    fn find_blocking(
        &self,
        key: LockKey,
        exclude_session_id: &str,
        now: Timestamp,
    ) -> Option<&ReservationLock> {
        self.rows.get(&key).and_then(|rows| {
            rows.iter()
                .find(|r| r.session_id != exclude_session_id && r.is_active_at(now))
        })
    }

    fn upsert(&mut self, lock: &NewReservationLock) -> ReservationLock {
        let rows = self.rows.entry(lock.key).or_default();

        if let Some(existing) = rows
            .iter_mut()
            .find(|r| r.session_id == lock.owner.session_id)
        {
            existing.acquired_at = lock.acquired_at;
            existing.expires_at = lock.expires_at;
            if lock.owner.signed_in_user().is_some() {
                existing.user_id = lock.owner.signed_in_user();
            }
            return existing.clone();
        }

        self.next_id += 1;
        let row = ReservationLock {
            id: self.next_id,
            resource_id: lock.key.resource_id,
            variant_id: lock.key.variant_id,
            user_id: lock.owner.signed_in_user(),
            session_id: lock.owner.session_id.clone(),
            acquired_at: lock.acquired_at,
            expires_at: lock.expires_at,
        };
        rows.push(row.clone());
        row
    }

    /// Drop rows matching `remove`, pruning empty keys. Returns rows removed.
    fn delete_where(&mut self, remove: impl Fn(&ReservationLock) -> bool) -> u64 {
        let mut deleted = 0u64;
        self.rows.retain(|_, rows| {
            let before = rows.len();
            rows.retain(|r| !remove(r));
            deleted += (before - rows.len()) as u64;
            !rows.is_empty()
        });
        deleted
    }
}

/// `LockStore` backed by a `HashMap` behind a `tokio` `RwLock`.
///
/// Every operation runs under one guard, so `acquire` is trivially
/// serialized. The guard is never held across an await on anything else.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    table: RwLock<Table>,
    unavailable: AtomicBool,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable datastore: every call fails with
    /// `StorageUnavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total rows held, expired or not.
    pub async fn row_count(&self) -> usize {
        self.table.read().await.rows.values().map(Vec::len).sum()
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::StorageUnavailable(
                "in-memory store marked unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn find_own_lock(
        &self,
        key: LockKey,
        session_id: &str,
    ) -> CoreResult<Option<ReservationLock>> {
        self.check_available()?;
        Ok(self.table.read().await.find_own(key, session_id).cloned())
    }

    async fn upsert(&self, lock: &NewReservationLock) -> CoreResult<ReservationLock> {
        self.check_available()?;
        Ok(self.table.write().await.upsert(lock))
    }

    async fn find_blocking_lock(
        &self,
        key: LockKey,
        exclude_session_id: &str,
        now: Timestamp,
    ) -> CoreResult<Option<ReservationLock>> {
        self.check_available()?;
        Ok(self
            .table
            .read()
            .await
            .find_blocking(key, exclude_session_id, now)
            .cloned())
    }

    async fn acquire(&self, lock: &NewReservationLock) -> CoreResult<AcquireOutcome> {
        self.check_available()?;
        let mut table = self.table.write().await;

        if let Some(blocking) =
            table.find_blocking(lock.key, &lock.owner.session_id, lock.acquired_at)
        {
            return Ok(AcquireOutcome::Denied {
                blocked_until: blocking.expires_at,
            });
        }

        Ok(AcquireOutcome::Acquired(table.upsert(lock)))
    }

    async fn delete_by_owner(&self, user_id: Option<DbId>, session_id: &str) -> CoreResult<u64> {
        self.check_available()?;
        let mut table = self.table.write().await;

        match user_id.filter(|id| *id > 0) {
            Some(user_id) => Ok(table.delete_where(|r| r.user_id == Some(user_id))),
            None if !session_id.is_empty() => Ok(table.delete_where(|r| r.session_id == session_id)),
            None => Ok(0),
        }
    }

    async fn delete_by_resource(&self, resource_id: DbId) -> CoreResult<u64> {
        self.check_available()?;
        Ok(self
            .table
            .write()
            .await
            .delete_where(|r| r.resource_id == resource_id))
    }

    async fn delete_expired(&self, now: Timestamp) -> CoreResult<u64> {
        self.check_available()?;
        Ok(self
            .table
            .write()
            .await
            .delete_where(|r| !r.is_active_at(now)))
    }

    async fn list_active_by_resource(
        &self,
        resource_id: DbId,
        now: Timestamp,
    ) -> CoreResult<Vec<ReservationLock>> {
        self.check_available()?;
        let table = self.table.read().await;

        let mut active: Vec<ReservationLock> = table
            .rows
            .iter()
            .filter(|(key, _)| key.resource_id == resource_id)
            .flat_map(|(_, rows)| rows.iter())
            .filter(|r| r.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at).then(b.id.cmp(&a.id)));
        Ok(active)
    }

    async fn ping(&self) -> CoreResult<()> {
        self.check_available()
    }
}
