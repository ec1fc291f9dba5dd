//! Reservation lock row model.

use serde::Serialize;
use sqlx::FromRow;
use reslock_core::reservation::ReservationLock;
use reslock_core::types::{DbId, Timestamp};

/// A row from the `reservation_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReservationLockRow {
    pub id: DbId,
    pub resource_id: DbId,
    pub variant_id: DbId,
    pub user_id: Option<DbId>,
    pub session_id: String,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<ReservationLockRow> for ReservationLock {
    fn from(row: ReservationLockRow) -> Self {
        ReservationLock {
            id: row.id,
            resource_id: row.resource_id,
            variant_id: row.variant_id,
            user_id: row.user_id,
            session_id: row.session_id,
            acquired_at: row.acquired_at,
            expires_at: row.expires_at,
        }
    }
}
