//! Handlers for the `/reservations` resource.
//!
//! These are the touch-points the storefront calls from its cart and checkout
//! flows. Owners are identified by the storefront's session token plus, when
//! the customer is signed in, the user id from their bearer token. A user id
//! is never read from a request body.

use axum::extract::State;
use axum::Json;
use reslock_core::reservation::{
    refusal_message, reservation_warning, AcquireOutcome, LockKey, LockOwner, ReservationLock,
    MSG_LOCK_STATUS_RESERVED,
};
use reslock_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /reservations/checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub session_id: String,
    /// One entry per cart line; duplicates are reserved once.
    pub lines: Vec<LockKey>,
}

/// A cart line that another customer holds.
#[derive(Debug, Serialize)]
pub struct DeniedLineView {
    pub resource_id: DbId,
    pub variant_id: DbId,
    pub blocked_until: Timestamp,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub fully_reserved: bool,
    pub acquired: Vec<ReservationLock>,
    pub denied: Vec<DeniedLineView>,
    pub lock_duration_mins: i64,
    /// Present only when the reservation notice is enabled and a non-empty
    /// cart is fully held.
    pub warning: Option<String>,
}

/// Body for `POST /reservations/acquire`.
#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    #[serde(default)]
    pub session_id: String,
    pub resource_id: DbId,
    #[serde(default)]
    pub variant_id: DbId,
    /// Overrides the configured duration for this acquisition.
    #[serde(default)]
    pub duration_mins: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HeldLockView {
    pub lock: ReservationLock,
    pub minutes_remaining: i64,
}

/// Body for `POST /reservations/check` and `POST /reservations/cart-insert`.
#[derive(Debug, Deserialize)]
pub struct LockQuery {
    pub resource_id: DbId,
    #[serde(default)]
    pub variant_id: DbId,
    #[serde(default)]
    pub session_id: String,
}

impl LockQuery {
    fn key(&self) -> LockKey {
        LockKey::new(self.resource_id, self.variant_id)
    }
}

#[derive(Debug, Serialize)]
pub struct LockStatus {
    /// `true` when another session holds an active lock.
    pub locked: bool,
    pub message: Option<&'static str>,
    /// Minutes left on the requester's own lock, if it holds one.
    pub held_minutes_remaining: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CartInsertResponse {
    pub allowed: bool,
}

/// Body for `POST /reservations/release`.
#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: u64,
}

fn owner_of(caller: Option<&AuthUser>, session_id: &str) -> LockOwner {
    LockOwner::new(caller.map(|user| user.user_id), session_id.trim())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/reservations/checkout
///
/// Reserves every cart line when the customer enters checkout. Lines held by
/// another customer come back in `denied` with the refusal text.
pub async fn checkout(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    Json(input): Json<CheckoutRequest>,
) -> AppResult<Json<DataResponse<CheckoutResponse>>> {
    let owner = owner_of(caller.as_ref(), &input.session_id);
    let reservation = state.coordinator.reserve_cart(&input.lines, &owner).await?;

    let lock_duration_mins = state.coordinator.lock_duration_mins();
    let fully_reserved = reservation.fully_reserved();
    let warning = (fully_reserved
        && !reservation.acquired.is_empty()
        && state.config.reservation.show_warning)
        .then(|| reservation_warning(lock_duration_mins));

    let denied = reservation
        .denied
        .into_iter()
        .map(|line| DeniedLineView {
            resource_id: line.key.resource_id,
            variant_id: line.key.variant_id,
            blocked_until: line.blocked_until,
            message: refusal_message(line.key),
        })
        .collect();

    Ok(Json(DataResponse {
        data: CheckoutResponse {
            fully_reserved,
            acquired: reservation.acquired,
            denied,
            lock_duration_mins,
            warning,
        },
    }))
}

/// POST /api/v1/reservations/acquire
///
/// Acquires or renews a single lock. A denial is a 409 `RESERVED`.
pub async fn acquire(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    Json(input): Json<AcquireRequest>,
) -> AppResult<Json<DataResponse<HeldLockView>>> {
    let key = LockKey::new(input.resource_id, input.variant_id);
    let owner = owner_of(caller.as_ref(), &input.session_id);
    let duration_mins = input
        .duration_mins
        .unwrap_or_else(|| state.coordinator.lock_duration_mins());

    match state
        .coordinator
        .try_acquire(key, &owner, duration_mins)
        .await?
    {
        AcquireOutcome::Acquired(lock) => {
            let minutes_remaining = lock.minutes_remaining(state.coordinator.now());
            Ok(Json(DataResponse {
                data: HeldLockView {
                    lock,
                    minutes_remaining,
                },
            }))
        }
        AcquireOutcome::Denied { .. } => Err(AppError::Reserved(refusal_message(key).into())),
    }
}

/// POST /api/v1/reservations/check
///
/// Lock status for a product page or cart line.
pub async fn check(
    State(state): State<AppState>,
    Json(input): Json<LockQuery>,
) -> AppResult<Json<DataResponse<LockStatus>>> {
    let key = input.key();
    let session_id = input.session_id.trim();

    let locked = state.coordinator.is_locked(key, session_id).await?;
    let held_minutes_remaining = if locked {
        None
    } else {
        let now = state.coordinator.now();
        state
            .coordinator
            .held_lock(key, session_id)
            .await?
            .map(|lock| lock.minutes_remaining(now))
    };

    Ok(Json(DataResponse {
        data: LockStatus {
            locked,
            message: locked.then_some(MSG_LOCK_STATUS_RESERVED),
            held_minutes_remaining,
        },
    }))
}

/// POST /api/v1/reservations/cart-insert
///
/// Gate run before a line is added to a cart. A held resource is a 409
/// `RESERVED` carrying the customer-facing refusal text.
pub async fn cart_insert(
    State(state): State<AppState>,
    Json(input): Json<LockQuery>,
) -> AppResult<Json<DataResponse<CartInsertResponse>>> {
    let refusal = state
        .coordinator
        .check_cart_insert(input.key(), input.session_id.trim())
        .await?;

    match refusal {
        Some(message) => Err(AppError::Reserved(message.into())),
        None => Ok(Json(DataResponse {
            data: CartInsertResponse { allowed: true },
        })),
    }
}

/// POST /api/v1/reservations/release
///
/// Called when the customer's cart is emptied. A signed-in customer releases
/// every lock under their user id; a guest only those of their session.
pub async fn release(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    Json(input): Json<ReleaseRequest>,
) -> AppResult<Json<DataResponse<ReleaseResponse>>> {
    let owner = owner_of(caller.as_ref(), &input.session_id);
    let released = state.coordinator.release(&owner).await?;
    Ok(Json(DataResponse {
        data: ReleaseResponse { released },
    }))
}
