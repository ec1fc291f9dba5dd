//! Reservation lock constants, types, and validation.
//!
//! A reservation lock gives one owner (a signed-in user or an anonymous
//! session) a time-bounded claim on a purchasable resource or one of its
//! variants, so two checkouts cannot both commit the last unit.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Lock duration constants
// ---------------------------------------------------------------------------

/// Default lock duration in minutes.
pub const DEFAULT_LOCK_DURATION_MINS: i64 = 10;

/// Minimum lock duration in minutes.
pub const MIN_LOCK_DURATION_MINS: i64 = 1;

/// Maximum lock duration in minutes.
pub const MAX_LOCK_DURATION_MINS: i64 = 60;

/// How often the expired-lock sweep runs (in seconds).
pub const LOCK_SWEEP_INTERVAL_SECS: u64 = 3600;

/// `variant_id` value meaning "the resource itself, not a specific variant".
pub const NO_VARIANT: DbId = 0;

// ---------------------------------------------------------------------------
// Order statuses
// ---------------------------------------------------------------------------

/// Order statuses reported by the order lifecycle collaborator.
pub mod order_statuses {
    pub const PENDING: &str = "pending";
    pub const ON_HOLD: &str = "on-hold";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const CANCELLED: &str = "cancelled";
    pub const REFUNDED: &str = "refunded";
}

/// Statuses that release every reservation held by the order's owner.
pub const RELEASING_ORDER_STATUSES: &[&str] = &[
    order_statuses::PROCESSING,
    order_statuses::COMPLETED,
    order_statuses::FAILED,
    order_statuses::CANCELLED,
    order_statuses::REFUNDED,
];

/// Returns `true` if moving an order into `status` releases its reservations.
pub fn releases_reservations(status: &str) -> bool {
    RELEASING_ORDER_STATUSES.contains(&status)
}

// ---------------------------------------------------------------------------
// Customer-facing messages
// ---------------------------------------------------------------------------

/// Shown when a cart insertion is refused because the resource is reserved.
pub const MSG_RESOURCE_RESERVED: &str =
    "Sorry, this product is currently reserved by another customer and cannot be added to your cart.";

/// Shown when a cart insertion is refused because the variant is reserved.
pub const MSG_VARIANT_RESERVED: &str =
    "Sorry, this product variation is currently reserved by another customer and cannot be added to your cart.";

/// Short form used by lock-status checks.
pub const MSG_LOCK_STATUS_RESERVED: &str =
    "This product is currently reserved by another customer.";

/// Refusal text for a cart insertion on `key`.
pub fn refusal_message(key: LockKey) -> &'static str {
    if key.is_variant() {
        MSG_VARIANT_RESERVED
    } else {
        MSG_RESOURCE_RESERVED
    }
}

/// Checkout notice telling the customer how long their cart is held.
pub fn reservation_warning(duration_mins: i64) -> String {
    format!(
        "Products in your cart are reserved for {duration_mins} minutes. \
         Please complete your order within this time."
    )
}

// ---------------------------------------------------------------------------
// Keys and owners
// ---------------------------------------------------------------------------

/// The contended thing: a resource, or one variant of it.
///
/// `(42, 0)` and `(42, 3)` are independent keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
    pub resource_id: DbId,
    #[serde(default)]
    pub variant_id: DbId,
}

impl LockKey {
    pub fn new(resource_id: DbId, variant_id: DbId) -> Self {
        Self {
            resource_id,
            variant_id,
        }
    }

    /// Key for the resource itself.
    pub fn resource(resource_id: DbId) -> Self {
        Self::new(resource_id, NO_VARIANT)
    }

    pub fn is_variant(&self) -> bool {
        self.variant_id != NO_VARIANT
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.resource_id <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "resource_id must be positive, got {}",
                self.resource_id
            )));
        }
        if self.variant_id < 0 {
            return Err(CoreError::InvalidInput(format!(
                "variant_id must not be negative, got {}",
                self.variant_id
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource_id, self.variant_id)
    }
}

/// Who holds or seeks a lock.
///
/// The session id is the equality key for lock rows; the user id only
/// widens [`release`](crate::coordinator::ReservationCoordinator::release)
/// to every row the signed-in principal owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    #[serde(default)]
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub session_id: String,
}

impl LockOwner {
    /// Build an owner; a user id of `0` is treated as anonymous.
    pub fn new(user_id: Option<DbId>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.filter(|id| *id > 0),
            session_id: session_id.into(),
        }
    }

    pub fn guest(session_id: impl Into<String>) -> Self {
        Self::new(None, session_id)
    }

    /// Signed-in user id, if any (never `Some(0)`).
    pub fn signed_in_user(&self) -> Option<DbId> {
        self.user_id.filter(|id| *id > 0)
    }

    /// Owners acquiring a lock must carry a session token.
    pub fn validate_for_acquire(&self) -> CoreResult<()> {
        if self.session_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "session_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lock rows
// ---------------------------------------------------------------------------

/// A persisted reservation lock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLock {
    pub id: DbId,
    pub resource_id: DbId,
    pub variant_id: DbId,
    pub user_id: Option<DbId>,
    pub session_id: String,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ReservationLock {
    pub fn key(&self) -> LockKey {
        LockKey::new(self.resource_id, self.variant_id)
    }

    /// The only validity predicate: a row is active strictly before expiry.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }

    /// Whole minutes left before expiry, rounded up; `0` once expired.
    pub fn minutes_remaining(&self, now: Timestamp) -> i64 {
        let secs = (self.expires_at - now).num_seconds();
        if secs <= 0 {
            0
        } else {
            (secs + 59) / 60
        }
    }
}

/// Payload for inserting or renewing an owner's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservationLock {
    pub key: LockKey,
    pub owner: LockOwner,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl NewReservationLock {
    /// A lock for `owner` on `key` that starts at `now` and lasts `duration_mins`.
    pub fn starting_at(key: LockKey, owner: LockOwner, now: Timestamp, duration_mins: i64) -> Self {
        Self {
            key,
            owner,
            acquired_at: now,
            expires_at: now + chrono::Duration::minutes(duration_mins),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of an acquisition attempt. `Denied` is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds (or renewed) the lock.
    Acquired(ReservationLock),
    /// Another owner holds an active lock until `blocked_until`. Nothing was written.
    Denied { blocked_until: Timestamp },
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired(_))
    }
}

/// A cart line that could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeniedLine {
    pub key: LockKey,
    pub blocked_until: Timestamp,
}

/// Result of reserving every line of a cart on checkout entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartReservation {
    pub acquired: Vec<ReservationLock>,
    pub denied: Vec<DeniedLine>,
}

impl CartReservation {
    pub fn fully_reserved(&self) -> bool {
        self.denied.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Order lifecycle
// ---------------------------------------------------------------------------

/// An order moving into a new status.
///
/// `session_id` is the guest session the host stored on the order when it
/// was created; it is ignored when `customer_id` identifies a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderTransition {
    pub order_id: DbId,
    #[serde(default)]
    pub customer_id: Option<DbId>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub new_status: String,
}

impl OrderTransition {
    /// The owner whose reservations this order releases, if identifiable.
    pub fn owner(&self) -> Option<LockOwner> {
        let user_id = self.customer_id.filter(|id| *id > 0);
        let session_id = self
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_default();

        if user_id.is_none() && session_id.is_empty() {
            return None;
        }
        Some(LockOwner::new(user_id, session_id))
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a lock duration in minutes.
pub fn validate_lock_duration(minutes: i64) -> CoreResult<()> {
    if minutes < MIN_LOCK_DURATION_MINS {
        return Err(CoreError::InvalidInput(format!(
            "Lock duration must be at least {MIN_LOCK_DURATION_MINS} minute(s), got {minutes}"
        )));
    }
    if minutes > MAX_LOCK_DURATION_MINS {
        return Err(CoreError::InvalidInput(format!(
            "Lock duration must be at most {MAX_LOCK_DURATION_MINS} minutes, got {minutes}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
