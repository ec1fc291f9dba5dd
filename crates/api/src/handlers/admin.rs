//! Administrator handlers.
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::Json;
use reslock_core::reservation::{LockKey, ReservationLock};
use reslock_core::types::DbId;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::reservations::ReleaseResponse;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub removed: u64,
}

/// GET /api/v1/admin/resources/{resource_id}/locks
pub async fn list_locks(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ReservationLock>>>> {
    LockKey::resource(resource_id).validate()?;
    let locks = state.coordinator.active_locks(resource_id).await?;
    Ok(Json(DataResponse { data: locks }))
}

/// DELETE /api/v1/admin/resources/{resource_id}/locks
///
/// Force-releases every lock on the resource, whoever holds it.
pub async fn release_locks(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(resource_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ReleaseResponse>>> {
    LockKey::resource(resource_id).validate()?;
    let released = state.coordinator.admin_release(resource_id).await?;
    tracing::info!(admin_id = admin.user_id, resource_id, released, "Admin released locks");
    Ok(Json(DataResponse {
        data: ReleaseResponse { released },
    }))
}

/// POST /api/v1/admin/sweep
///
/// Runs the expired-lock sweep immediately.
pub async fn sweep(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<SweepResponse>>> {
    let removed = state.coordinator.sweep().await?;
    tracing::info!(admin_id = admin.user_id, removed, "Manual lock sweep");
    Ok(Json(DataResponse {
        data: SweepResponse { removed },
    }))
}
