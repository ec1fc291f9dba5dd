//! Handlers for order lifecycle notifications.

use axum::extract::State;
use axum::Json;
use reslock_core::reservation::OrderTransition;

use crate::error::{AppError, AppResult};
use crate::handlers::reservations::ReleaseResponse;
use crate::middleware::rbac::RequireService;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/orders/status
///
/// The storefront reports an order entering a new status. Releasing statuses
/// drop every lock the order's owner holds; any other status is a no-op.
/// Only the storefront backend may call this, since the body names the customer.
pub async fn status_changed(
    State(state): State<AppState>,
    RequireService(caller): RequireService,
    Json(transition): Json<OrderTransition>,
) -> AppResult<Json<DataResponse<ReleaseResponse>>> {
    if transition.new_status.trim().is_empty() {
        return Err(AppError::BadRequest("new_status must not be empty".into()));
    }

    let released = state.coordinator.release_for_order(&transition).await?;
    tracing::debug!(
        caller_id = caller.user_id,
        order_id = transition.order_id,
        new_status = %transition.new_status,
        released,
        "Order status reported"
    );
    Ok(Json(DataResponse {
        data: ReleaseResponse { released },
    }))
}
