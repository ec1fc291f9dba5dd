//! Persistence contract for reservation lock rows.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::reservation::{AcquireOutcome, LockKey, NewReservationLock, ReservationLock};
use crate::types::{DbId, Timestamp};

/// Storage primitives over `ReservationLock` rows.
///
/// Empty results and unknown ids are normal outcomes. Every failure to reach
/// the datastore (or a missing schema, or a timeout) surfaces as
/// [`CoreError::StorageUnavailable`](crate::error::CoreError::StorageUnavailable).
///
/// Implementations must be safe to call concurrently from any number of tasks.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// The row owned by `session_id` on `key`, whether or not it has expired.
    async fn find_own_lock(
        &self,
        key: LockKey,
        session_id: &str,
    ) -> CoreResult<Option<ReservationLock>>;

    /// Insert the owner's row, or re-timestamp it in place if one exists.
    ///
    /// Repeated calls for the same `(key, session_id)` never create a second row.
    async fn upsert(&self, lock: &NewReservationLock) -> CoreResult<ReservationLock>;

    /// Any row on `key` owned by a session other than `exclude_session_id`
    /// with `expires_at > now`.
    async fn find_blocking_lock(
        &self,
        key: LockKey,
        exclude_session_id: &str,
        now: Timestamp,
    ) -> CoreResult<Option<ReservationLock>>;

    /// Check for a blocking lock and upsert the caller's row as one serialized
    /// step per `key`, evaluated at `lock.acquired_at`.
    ///
    /// Two owners racing for the same key can never both observe "unblocked".
    /// A denial writes nothing.
    async fn acquire(&self, lock: &NewReservationLock) -> CoreResult<AcquireOutcome>;

    /// Remove every row owned by `user_id` when it is set, otherwise every row
    /// owned by `session_id`. Returns the number of rows removed.
    async fn delete_by_owner(&self, user_id: Option<DbId>, session_id: &str) -> CoreResult<u64>;

    /// Remove every row on `resource_id` (all variants, all owners).
    async fn delete_by_resource(&self, resource_id: DbId) -> CoreResult<u64>;

    /// Remove every row with `expires_at <= now`.
    async fn delete_expired(&self, now: Timestamp) -> CoreResult<u64>;

    /// Active rows on `resource_id`, most recently acquired first.
    async fn list_active_by_resource(
        &self,
        resource_id: DbId,
        now: Timestamp,
    ) -> CoreResult<Vec<ReservationLock>>;

    /// Verify the datastore is reachable.
    async fn ping(&self) -> CoreResult<()>;
}
