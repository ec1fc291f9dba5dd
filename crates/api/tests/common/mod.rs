#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use reslock_core::clock::ManualClock;
use reslock_core::coordinator::ReservationCoordinator;
use reslock_core::memory::MemoryLockStore;
use tower::ServiceExt;

use reslock_api::auth::jwt::{Claims, JwtConfig};
use reslock_api::config::{ReservationConfig, ServerConfig};
use reslock_api::router::build_app_router;
use reslock_api::state::AppState;

/// Fixed start time for the manual clock.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(reservation: ReservationConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        },
        reservation,
    }
}

/// The application under test plus handles on its store and clock.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryLockStore>,
    pub clock: Arc<ManualClock>,
    pub config: ServerConfig,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Sign a token the way the storefront platform would.
    pub fn token(&self, user_id: i64, role: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            exp: now + 15 * 60,
            iat: Some(now),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .expect("token generation")
    }

    pub fn admin_token(&self) -> String {
        self.token(1, "admin")
    }

    pub fn service_token(&self) -> String {
        self.token(2, "service")
    }

    pub fn customer_token(&self, user_id: i64) -> String {
        self.token(user_id, "customer")
    }
}

/// Build the full application router over an in-memory store, using the same
/// middleware stack as production.
pub fn build_test_app() -> TestApp {
    build_test_app_with(ReservationConfig::default())
}

pub fn build_test_app_with(reservation: ReservationConfig) -> TestApp {
    let config = test_config(reservation);
    let store = Arc::new(MemoryLockStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let coordinator = ReservationCoordinator::with_clock(
        store.clone(),
        clock.clone(),
        config.reservation.lock_duration_mins,
    )
    .expect("valid lock duration");

    let state = AppState {
        coordinator: Arc::new(coordinator),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        clock,
        config,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::delete(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}
