pub mod admin;
pub mod health;
pub mod orders;
pub mod reservations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /reservations/checkout                         reserve every cart line
/// /reservations/acquire                          acquire or renew one lock
/// /reservations/check                            lock status
/// /reservations/cart-insert                      cart insertion gate
/// /reservations/release                          release on cart emptied
///
/// /orders/status                                 order status transition
///
/// /admin/resources/{resource_id}/locks           list, force-release (admin only)
/// /admin/sweep                                   run expiry sweep (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/reservations", reservations::router())
        .nest("/orders", orders::router())
        .nest("/admin", admin::router())
}
