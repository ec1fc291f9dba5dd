//! Reservation policy on top of a [`LockStore`].
//!
//! The coordinator decides lock durations, when a caller may acquire or renew,
//! which rows a release clears, and drives expiry sweeps. It never retries a
//! failed store call and never guesses on `StorageUnavailable`; callers decide
//! whether a failed check means "block" or "allow".

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::CoreResult;
use crate::reservation::{
    refusal_message, releases_reservations, validate_lock_duration, AcquireOutcome, CartReservation, DeniedLine,
    LockKey, LockOwner, NewReservationLock, OrderTransition, ReservationLock,
};
use crate::store::LockStore;
use crate::types::{DbId, Timestamp};

/// Lock engine entry point shared by every collaborator.
///
/// Cheap to share behind an `Arc`; holds no mutable state of its own.
pub struct ReservationCoordinator {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    lock_duration_mins: i64,
}

impl ReservationCoordinator {
    /// Build a coordinator on the wall clock with the configured default duration.
    pub fn new(store: Arc<dyn LockStore>, lock_duration_mins: i64) -> CoreResult<Self> {
        Self::with_clock(store, Arc::new(SystemClock), lock_duration_mins)
    }

    pub fn with_clock(
        store: Arc<dyn LockStore>,
        clock: Arc<dyn Clock>,
        lock_duration_mins: i64,
    ) -> CoreResult<Self> {
        validate_lock_duration(lock_duration_mins)?;
        Ok(Self {
            store,
            clock,
            lock_duration_mins,
        })
    }

    /// Configured default lock duration in minutes.
    pub fn lock_duration_mins(&self) -> i64 {
        self.lock_duration_mins
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Acquire / check
    // -----------------------------------------------------------------------

    /// Acquire or renew `owner`'s lock on `key` for `duration_mins`.
    ///
    /// Input is validated before the store is touched. The blocking check and
    /// the upsert run as one serialized store step, so two owners racing for
    /// the same key cannot both succeed.
    pub async fn try_acquire(
        &self,
        key: LockKey,
        owner: &LockOwner,
        duration_mins: i64,
    ) -> CoreResult<AcquireOutcome> {
        owner.validate_for_acquire()?;
        key.validate()?;
        validate_lock_duration(duration_mins)?;

        let lock = NewReservationLock::starting_at(key, owner.clone(), self.now(), duration_mins);
        let outcome = self.store.acquire(&lock).await?;

        match &outcome {
            AcquireOutcome::Acquired(row) => {
                tracing::debug!(
                    resource_id = key.resource_id,
                    variant_id = key.variant_id,
                    lock_id = row.id,
                    expires_at = %row.expires_at,
                    "Reservation acquired"
                );
            }
            AcquireOutcome::Denied { blocked_until } => {
                tracing::debug!(
                    resource_id = key.resource_id,
                    variant_id = key.variant_id,
                    blocked_until = %blocked_until,
                    "Reservation denied"
                );
            }
        }
        Ok(outcome)
    }

    /// [`try_acquire`](Self::try_acquire) with the configured duration.
    pub async fn try_acquire_default(
        &self,
        key: LockKey,
        owner: &LockOwner,
    ) -> CoreResult<AcquireOutcome> {
        self.try_acquire(key, owner, self.lock_duration_mins).await
    }

    /// Reserve every line of a cart on checkout entry.
    ///
    /// Each distinct key is acquired independently; a denied line does not
    /// undo lines already reserved.
    pub async fn reserve_cart(
        &self,
        lines: &[LockKey],
        owner: &LockOwner,
    ) -> CoreResult<CartReservation> {
        owner.validate_for_acquire()?;
        for key in lines {
            key.validate()?;
        }

        let mut seen = HashSet::new();
        let mut reservation = CartReservation::default();

        for key in lines.iter().copied().filter(|k| seen.insert(*k)) {
            match self.try_acquire_default(key, owner).await? {
                AcquireOutcome::Acquired(row) => reservation.acquired.push(row),
                AcquireOutcome::Denied { blocked_until } => {
                    reservation.denied.push(DeniedLine { key, blocked_until })
                }
            }
        }

        tracing::info!(
            session_id = %owner.session_id,
            acquired = reservation.acquired.len(),
            denied = reservation.denied.len(),
            "Cart reservation processed"
        );
        Ok(reservation)
    }

    /// `true` iff another session holds an active lock on `key`.
    ///
    /// An empty `requesting_session_id` has no lock of its own, so every
    /// active lock blocks it.
    pub async fn is_locked(&self, key: LockKey, requesting_session_id: &str) -> CoreResult<bool> {
        key.validate()?;
        let blocking = self
            .store
            .find_blocking_lock(key, requesting_session_id, self.now())
            .await?;
        Ok(blocking.is_some())
    }

    /// The requester's own lock on `key`, only while it is still active.
    pub async fn held_lock(
        &self,
        key: LockKey,
        session_id: &str,
    ) -> CoreResult<Option<ReservationLock>> {
        key.validate()?;
        if session_id.is_empty() {
            return Ok(None);
        }
        let now = self.now();
        let own = self.store.find_own_lock(key, session_id).await?;
        Ok(own.filter(|lock| lock.is_active_at(now)))
    }

    /// Gate for adding `key` to a cart: the customer-facing refusal text when
    /// another session holds it, `None` when the insertion may proceed.
    pub async fn check_cart_insert(
        &self,
        key: LockKey,
        session_id: &str,
    ) -> CoreResult<Option<&'static str>> {
        if self.is_locked(key, session_id).await? {
            tracing::debug!(
                resource_id = key.resource_id,
                variant_id = key.variant_id,
                "Cart insertion refused"
            );
            return Ok(Some(refusal_message(key)));
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Release / sweep
    // -----------------------------------------------------------------------

    /// Release every lock owned by `owner` (by user id when signed in,
    /// otherwise by session). An owner with neither is a no-op.
    pub async fn release(&self, owner: &LockOwner) -> CoreResult<u64> {
        let user_id = owner.signed_in_user();
        if user_id.is_none() && owner.session_id.is_empty() {
            tracing::debug!("Release skipped: no user or session to release for");
            return Ok(0);
        }

        let released = self.store.delete_by_owner(user_id, &owner.session_id).await?;
        tracing::info!(
            user_id = ?user_id,
            session_id = %owner.session_id,
            released,
            "Reservations released"
        );
        Ok(released)
    }

    /// Release the order owner's locks when the order enters a releasing status.
    pub async fn release_for_order(&self, transition: &OrderTransition) -> CoreResult<u64> {
        if !releases_reservations(&transition.new_status) {
            tracing::debug!(
                order_id = transition.order_id,
                status = %transition.new_status,
                "Order status does not release reservations"
            );
            return Ok(0);
        }

        match transition.owner() {
            Some(owner) => self.release(&owner).await,
            None => {
                tracing::warn!(
                    order_id = transition.order_id,
                    "Order has neither a customer nor a captured session; nothing to release"
                );
                Ok(0)
            }
        }
    }

    /// Administrator override: drop every lock on `resource_id`.
    ///
    /// Authorization is the caller's responsibility.
    pub async fn admin_release(&self, resource_id: DbId) -> CoreResult<u64> {
        let released = self.store.delete_by_resource(resource_id).await?;
        tracing::info!(resource_id, released, "Reservations force-released by administrator");
        Ok(released)
    }

    /// Active locks on `resource_id`, most recent first.
    pub async fn active_locks(&self, resource_id: DbId) -> CoreResult<Vec<ReservationLock>> {
        self.store
            .list_active_by_resource(resource_id, self.now())
            .await
    }

    /// Remove every lock expired as of the clock's current time.
    pub async fn sweep(&self) -> CoreResult<u64> {
        self.sweep_at(self.now()).await
    }

    /// Remove every lock with `expires_at <= now`. Idempotent.
    pub async fn sweep_at(&self, now: Timestamp) -> CoreResult<u64> {
        self.store.delete_expired(now).await
    }

    /// Probe the underlying store.
    pub async fn health_check(&self) -> CoreResult<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CoreError;
    use crate::memory::MemoryLockStore;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    struct Harness {
        store: Arc<MemoryLockStore>,
        clock: Arc<ManualClock>,
        coordinator: ReservationCoordinator,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryLockStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let coordinator =
            ReservationCoordinator::with_clock(store.clone(), clock.clone(), 10).unwrap();
        Harness {
            store,
            clock,
            coordinator,
        }
    }

    // -----------------------------------------------------------------------
    // Construction and validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_rejects_out_of_range_default_duration() {
        let store = Arc::new(MemoryLockStore::new());
        assert!(ReservationCoordinator::new(store.clone(), 0).is_err());
        assert!(ReservationCoordinator::new(store, 61).is_err());
    }

    #[tokio::test]
    async fn test_empty_session_rejected_before_store_access() {
        let h = harness();
        // An unreachable store would fail with StorageUnavailable if touched.
        h.store.set_unavailable(true);

        let result = h
            .coordinator
            .try_acquire(LockKey::resource(1), &LockOwner::guest(""), 10)
            .await;
        assert_matches!(result, Err(CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_invalid_duration_rejected() {
        let h = harness();
        let result = h
            .coordinator
            .try_acquire(LockKey::resource(1), &LockOwner::guest("a"), 0)
            .await;
        assert_matches!(result, Err(CoreError::InvalidInput(_)));
        assert_eq!(h.store.row_count().await, 0);
    }

    // -----------------------------------------------------------------------
    // Acquisition
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_acquire_sets_expiry_from_duration() {
        let h = harness();
        let outcome = h
            .coordinator
            .try_acquire(LockKey::resource(42), &LockOwner::guest("a"), 15)
            .await
            .unwrap();
        assert_matches!(outcome, AcquireOutcome::Acquired(row) if row.expires_at == t0() + Duration::minutes(15));
    }

    #[tokio::test]
    async fn test_renewal_is_idempotent() {
        let h = harness();
        let key = LockKey::resource(42);
        let owner = LockOwner::guest("a");

        h.coordinator.try_acquire_default(key, &owner).await.unwrap();
        h.clock.advance(Duration::minutes(4));
        let outcome = h.coordinator.try_acquire_default(key, &owner).await.unwrap();

        assert_matches!(outcome, AcquireOutcome::Acquired(row) if row.expires_at == t0() + Duration::minutes(14));
        assert_eq!(h.store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_self_exclusion() {
        let h = harness();
        let key = LockKey::new(7, 3);
        h.coordinator
            .try_acquire_default(key, &LockOwner::guest("a"))
            .await
            .unwrap();

        assert!(!h.coordinator.is_locked(key, "a").await.unwrap());
        assert!(h.coordinator.is_locked(key, "b").await.unwrap());
        assert!(h.coordinator.is_locked(key, "").await.unwrap());
    }

    #[tokio::test]
    async fn test_checkout_scenario_deny_then_expire() {
        let h = harness();
        let key = LockKey::resource(42);
        let a = LockOwner::guest("session-a");
        let b = LockOwner::guest("session-b");

        let first = h.coordinator.try_acquire(key, &a, 10).await.unwrap();
        assert!(first.is_acquired());

        h.clock.advance(Duration::minutes(1));
        let denied = h.coordinator.try_acquire(key, &b, 10).await.unwrap();
        assert_matches!(denied, AcquireOutcome::Denied { blocked_until } if blocked_until == t0() + Duration::minutes(10));
        assert!(h.coordinator.is_locked(key, "session-b").await.unwrap());
        assert!(h.store.find_own_lock(key, "session-b").await.unwrap().is_none());

        h.clock.set(t0() + Duration::minutes(11));
        assert!(!h.coordinator.is_locked(key, "session-b").await.unwrap());
        let acquired = h.coordinator.try_acquire(key, &b, 10).await.unwrap();
        assert!(acquired.is_acquired());

        // Session A's stale row is still physically present until swept.
        assert_eq!(h.store.row_count().await, 2);
        let swept = h.coordinator.sweep().await.unwrap();
        assert_eq!(swept, 1);
        assert!(h.store.find_own_lock(key, "session-a").await.unwrap().is_none());
        assert!(h.store.find_own_lock(key, "session-b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_variant_and_resource_locks_independent() {
        let h = harness();
        h.coordinator
            .try_acquire_default(LockKey::resource(42), &LockOwner::guest("a"))
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .try_acquire_default(LockKey::new(42, 1), &LockOwner::guest("b"))
            .await
            .unwrap();
        assert!(outcome.is_acquired());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_single_winner() {
        let h = harness();
        let coordinator = Arc::new(h.coordinator);
        let key = LockKey::new(99, 1);

        let mut handles = Vec::new();
        for i in 0..16 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                let owner = LockOwner::guest(format!("racer-{i}"));
                coordinator.try_acquire_default(key, &owner).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_acquired() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(h.store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_held_lock_only_while_active() {
        let h = harness();
        let key = LockKey::resource(3);
        h.coordinator
            .try_acquire_default(key, &LockOwner::guest("a"))
            .await
            .unwrap();

        assert!(h.coordinator.held_lock(key, "a").await.unwrap().is_some());
        assert!(h.coordinator.held_lock(key, "b").await.unwrap().is_none());

        h.clock.advance(Duration::minutes(10));
        assert!(h.coordinator.held_lock(key, "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cart_insert_refusal_wording() {
        let h = harness();
        let variant = LockKey::new(5, 2);
        h.coordinator
            .try_acquire_default(variant, &LockOwner::guest("a"))
            .await
            .unwrap();

        let refused = h.coordinator.check_cart_insert(variant, "b").await.unwrap();
        assert_eq!(refused, Some(crate::reservation::MSG_VARIANT_RESERVED));
        assert_eq!(h.coordinator.check_cart_insert(variant, "a").await.unwrap(), None);
        assert_eq!(
            h.coordinator
                .check_cart_insert(LockKey::resource(5), "b")
                .await
                .unwrap(),
            None
        );
    }

    // -----------------------------------------------------------------------
    // Cart reservation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_reserve_cart_partial_denial() {
        let h = harness();
        h.coordinator
            .try_acquire_default(LockKey::resource(2), &LockOwner::guest("other"))
            .await
            .unwrap();

        let lines = [
            LockKey::resource(1),
            LockKey::resource(2),
            LockKey::new(3, 4),
            LockKey::resource(1),
        ];
        let reservation = h
            .coordinator
            .reserve_cart(&lines, &LockOwner::guest("me"))
            .await
            .unwrap();

        assert_eq!(reservation.acquired.len(), 2);
        assert_eq!(reservation.denied.len(), 1);
        assert_eq!(reservation.denied[0].key, LockKey::resource(2));
        assert!(!reservation.fully_reserved());
    }

    #[tokio::test]
    async fn test_reserve_cart_validates_every_line_first() {
        let h = harness();
        let lines = [LockKey::resource(1), LockKey::resource(0)];
        let result = h
            .coordinator
            .reserve_cart(&lines, &LockOwner::guest("me"))
            .await;
        assert_matches!(result, Err(CoreError::InvalidInput(_)));
        assert_eq!(h.store.row_count().await, 0);
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_order_completion_releases_immediately() {
        let h = harness();
        let key = LockKey::new(7, 3);
        let owner = LockOwner::new(Some(55), "session-a");
        h.coordinator.try_acquire_default(key, &owner).await.unwrap();
        assert!(h.coordinator.is_locked(key, "someone-else").await.unwrap());

        let released = h
            .coordinator
            .release_for_order(&OrderTransition {
                order_id: 1001,
                customer_id: Some(55),
                session_id: None,
                new_status: "completed".into(),
            })
            .await
            .unwrap();

        assert_eq!(released, 1);
        assert!(!h.coordinator.is_locked(key, "someone-else").await.unwrap());
    }

    #[tokio::test]
    async fn test_guest_order_releases_by_captured_session() {
        let h = harness();
        h.coordinator
            .try_acquire_default(LockKey::resource(8), &LockOwner::guest("guest-1"))
            .await
            .unwrap();

        let released = h
            .coordinator
            .release_for_order(&OrderTransition {
                order_id: 1002,
                customer_id: Some(0),
                session_id: Some("guest-1".into()),
                new_status: "processing".into(),
            })
            .await
            .unwrap();
        assert_eq!(released, 1);
    }

    #[tokio::test]
    async fn test_non_releasing_status_keeps_locks() {
        let h = harness();
        let owner = LockOwner::new(Some(55), "session-a");
        h.coordinator
            .try_acquire_default(LockKey::resource(8), &owner)
            .await
            .unwrap();

        let released = h
            .coordinator
            .release_for_order(&OrderTransition {
                order_id: 1003,
                customer_id: Some(55),
                session_id: None,
                new_status: "on-hold".into(),
            })
            .await
            .unwrap();
        assert_eq!(released, 0);
        assert_eq!(h.store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_release_completeness() {
        let h = harness();
        let owner = LockOwner::guest("cart-session");
        for id in 1..=3 {
            h.coordinator
                .try_acquire_default(LockKey::resource(id), &owner)
                .await
                .unwrap();
        }
        h.coordinator
            .try_acquire_default(LockKey::resource(4), &LockOwner::guest("keeper"))
            .await
            .unwrap();

        assert_eq!(h.coordinator.release(&owner).await.unwrap(), 3);
        for id in 1..=3 {
            assert!(h
                .store
                .find_own_lock(LockKey::resource(id), "cart-session")
                .await
                .unwrap()
                .is_none());
        }
        assert_eq!(h.store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_release_without_identity_is_noop() {
        let h = harness();
        h.store.set_unavailable(true);
        assert_eq!(h.coordinator.release(&LockOwner::guest("")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_admin_release_and_listing() {
        let h = harness();
        h.coordinator
            .try_acquire_default(LockKey::resource(20), &LockOwner::guest("a"))
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(1));
        h.coordinator
            .try_acquire_default(LockKey::new(20, 2), &LockOwner::guest("b"))
            .await
            .unwrap();

        let active = h.coordinator.active_locks(20).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].session_id, "b");

        assert_eq!(h.coordinator.admin_release(20).await.unwrap(), 2);
        assert!(h.coordinator.active_locks(20).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Sweep and failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_sweep_never_removes_active_rows() {
        let h = harness();
        h.coordinator
            .try_acquire(LockKey::resource(1), &LockOwner::guest("a"), 5)
            .await
            .unwrap();
        h.coordinator
            .try_acquire(LockKey::resource(2), &LockOwner::guest("b"), 30)
            .await
            .unwrap();

        assert_eq!(h.coordinator.sweep_at(t0() + Duration::minutes(4)).await.unwrap(), 0);
        assert_eq!(h.coordinator.sweep_at(t0() + Duration::minutes(5)).await.unwrap(), 1);
        assert_eq!(h.coordinator.sweep_at(t0() + Duration::minutes(5)).await.unwrap(), 0);
        assert_eq!(h.store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let h = harness();
        h.store.set_unavailable(true);

        assert_matches!(
            h.coordinator.is_locked(LockKey::resource(1), "a").await,
            Err(CoreError::StorageUnavailable(_))
        );
        assert_matches!(
            h.coordinator
                .try_acquire_default(LockKey::resource(1), &LockOwner::guest("a"))
                .await,
            Err(CoreError::StorageUnavailable(_))
        );
        assert_matches!(h.coordinator.sweep().await, Err(CoreError::StorageUnavailable(_)));
        assert_matches!(h.coordinator.health_check().await, Err(CoreError::StorageUnavailable(_)));
    }
}
