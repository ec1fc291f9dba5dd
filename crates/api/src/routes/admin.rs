//! Route definitions for the `/admin` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET    /resources/{resource_id}/locks   -> list_locks
/// DELETE /resources/{resource_id}/locks   -> release_locks
/// POST   /sweep                           -> sweep
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/resources/{resource_id}/locks",
            get(admin::list_locks).delete(admin::release_locks),
        )
        .route("/sweep", post(admin::sweep))
}
