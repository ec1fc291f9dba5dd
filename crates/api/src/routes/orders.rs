//! Route definitions for the `/orders` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::orders;
use crate::state::AppState;

/// Routes mounted at `/orders`.
///
/// ```text
/// POST   /status    -> status_changed   (service token)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/status", post(orders::status_changed))
}
