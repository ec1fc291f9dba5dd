use std::sync::Arc;

use reslock_core::coordinator::ReservationCoordinator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Reservation lock engine over the configured store.
    pub coordinator: Arc<ReservationCoordinator>,
    /// Server configuration (read by middleware and handlers).
    pub config: Arc<ServerConfig>,
}
