//! Repository for the `reservation_locks` table.

use sqlx::{PgExecutor, PgPool};
use reslock_core::reservation::{LockKey, NewReservationLock};
use reslock_core::types::{DbId, Timestamp};

use crate::models::reservation_lock::ReservationLockRow;

/// Column list for `reservation_locks` queries.
const COLUMNS: &str = "id, resource_id, variant_id, user_id, session_id, acquired_at, expires_at";

/// Namespace prefix for the per-key advisory lock, so the hash space does not
/// overlap other advisory lock users of the same database.
const ADVISORY_NAMESPACE: &str = "reservation_lock";

/// Outcome of [`ReservationLockRepo::acquire`].
#[derive(Debug, Clone)]
pub enum AcquireResult {
    /// The caller's row after insert or renewal.
    Acquired(ReservationLockRow),
    /// An active row owned by another session. Nothing was written.
    Blocked(ReservationLockRow),
}

/// Provides queries over reservation lock rows.
pub struct ReservationLockRepo;

impl ReservationLockRepo {
    /// The row owned by `session_id` on `key`, regardless of expiry.
    pub async fn find_own(
        pool: &PgPool,
        key: LockKey,
        session_id: &str,
    ) -> Result<Option<ReservationLockRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM reservation_locks \
             WHERE resource_id = $1 AND variant_id = $2 AND session_id = $3"
        );
        sqlx::query_as::<_, ReservationLockRow>(&query)
            .bind(key.resource_id)
            .bind(key.variant_id)
            .bind(session_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert the owner's row or re-timestamp the existing one.
    ///
    /// Uses `INSERT ... ON CONFLICT DO UPDATE` against the unique index on
    /// `(resource_id, variant_id, session_id)`, so repeated calls never
    /// duplicate. A known user id is kept if the renewal carries none.
    pub async fn upsert(
        pool: &PgPool,
        lock: &NewReservationLock,
    ) -> Result<ReservationLockRow, sqlx::Error> {
        upsert_with(pool, lock).await
    }

    /// Any active row on `key` owned by a session other than `exclude_session_id`.
    pub async fn find_blocking(
        pool: &PgPool,
        key: LockKey,
        exclude_session_id: &str,
        now: Timestamp,
    ) -> Result<Option<ReservationLockRow>, sqlx::Error> {
        find_blocking_with(pool, key, exclude_session_id, now).await
    }

    /// Check-then-upsert as one serialized step for `lock.key`.
    ///
    /// Runs in a transaction holding a transaction-scoped advisory lock on a
    /// hash of the key, so concurrent acquirers of the same resource/variant
    /// queue behind each other (across processes too) while unrelated keys
    /// proceed in parallel. The advisory lock is released on commit/rollback.
    pub async fn acquire(
        pool: &PgPool,
        lock: &NewReservationLock,
    ) -> Result<AcquireResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{ADVISORY_NAMESPACE}:{}", lock.key))
            .execute(&mut *tx)
            .await?;

        let blocking =
            find_blocking_with(&mut *tx, lock.key, &lock.owner.session_id, lock.acquired_at)
                .await?;
        if let Some(row) = blocking {
            tx.rollback().await?;
            return Ok(AcquireResult::Blocked(row));
        }

        let row = upsert_with(&mut *tx, lock).await?;
        tx.commit().await?;
        Ok(AcquireResult::Acquired(row))
    }

    /// Delete every row owned by `user_id` when set, else by `session_id`.
    ///
    /// Returns the number of rows removed; `0` when neither is given.
    pub async fn delete_by_owner(
        pool: &PgPool,
        user_id: Option<DbId>,
        session_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = match user_id.filter(|id| *id > 0) {
            Some(user_id) => {
                sqlx::query("DELETE FROM reservation_locks WHERE user_id = $1")
                    .bind(user_id)
                    .execute(pool)
                    .await?
            }
            None if !session_id.is_empty() => {
                sqlx::query("DELETE FROM reservation_locks WHERE session_id = $1")
                    .bind(session_id)
                    .execute(pool)
                    .await?
            }
            None => return Ok(0),
        };
        Ok(result.rows_affected())
    }

    /// Delete every row on a resource, any variant and any owner.
    pub async fn delete_by_resource(pool: &PgPool, resource_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reservation_locks WHERE resource_id = $1")
            .bind(resource_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every row with `expires_at <= now`. Returns the number removed.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reservation_locks WHERE expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Active rows on a resource, most recently acquired first.
    pub async fn list_active_by_resource(
        pool: &PgPool,
        resource_id: DbId,
        now: Timestamp,
    ) -> Result<Vec<ReservationLockRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM reservation_locks \
             WHERE resource_id = $1 AND expires_at > $2 \
             ORDER BY acquired_at DESC, id DESC"
        );
        sqlx::query_as::<_, ReservationLockRow>(&query)
            .bind(resource_id)
            .bind(now)
            .fetch_all(pool)
            .await
    }
}

async fn find_blocking_with<'e>(
    executor: impl PgExecutor<'e>,
    key: LockKey,
    exclude_session_id: &str,
    now: Timestamp,
) -> Result<Option<ReservationLockRow>, sqlx::Error> {
    let query = format!(
        "SELECT {COLUMNS} FROM reservation_locks \
         WHERE resource_id = $1 AND variant_id = $2 \
           AND session_id <> $3 AND expires_at > $4 \
         ORDER BY expires_at DESC \
         LIMIT 1"
    );
    sqlx::query_as::<_, ReservationLockRow>(&query)
        .bind(key.resource_id)
        .bind(key.variant_id)
        .bind(exclude_session_id)
        .bind(now)
        .fetch_optional(executor)
        .await
}

async fn upsert_with<'e>(
    executor: impl PgExecutor<'e>,
    lock: &NewReservationLock,
) -> Result<ReservationLockRow, sqlx::Error> {
    let query = format!(
        "INSERT INTO reservation_locks \
             (resource_id, variant_id, user_id, session_id, acquired_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (resource_id, variant_id, session_id) \
         DO UPDATE SET acquired_at = EXCLUDED.acquired_at, \
                       expires_at = EXCLUDED.expires_at, \
                       user_id = COALESCE(EXCLUDED.user_id, reservation_locks.user_id) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, ReservationLockRow>(&query)
        .bind(lock.key.resource_id)
        .bind(lock.key.variant_id)
        .bind(lock.owner.signed_in_user())
        .bind(&lock.owner.session_id)
        .bind(lock.acquired_at)
        .bind(lock.expires_at)
        .fetch_one(executor)
        .await
}
