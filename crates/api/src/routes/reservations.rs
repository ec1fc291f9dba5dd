//! Route definitions for the `/reservations` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::reservations;
use crate::state::AppState;

/// Routes mounted at `/reservations`. A customer bearer token is optional;
/// when present it supplies the owner's user id.
///
/// ```text
/// POST   /checkout       -> checkout
/// POST   /acquire        -> acquire
/// POST   /check          -> check
/// POST   /cart-insert    -> cart_insert
/// POST   /release        -> release
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(reservations::checkout))
        .route("/acquire", post(reservations::acquire))
        .route("/check", post(reservations::check))
        .route("/cart-insert", post(reservations::cart_insert))
        .route("/release", post(reservations::release))
}
