use reslock_core::reservation::{
    validate_lock_duration, DEFAULT_LOCK_DURATION_MINS, LOCK_SWEEP_INTERVAL_SECS,
};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks after the server stops (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Reservation lock settings.
    pub reservation: ReservationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    ///
    /// See [`JwtConfig::from_env`] and [`ReservationConfig::from_env`] for the
    /// nested sections.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();
        let reservation = ReservationConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            reservation,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A reservation setting that could not be parsed or is out of range.
#[derive(Debug, thiserror::Error)]
#[error("{name} {reason}, got '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Administrator-tunable reservation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConfig {
    /// Default lock duration in minutes (1..=60).
    pub lock_duration_mins: i64,
    /// Whether checkout responses carry the "reserved for N minutes" notice.
    pub show_warning: bool,
    /// Seconds between expired-lock sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            lock_duration_mins: DEFAULT_LOCK_DURATION_MINS,
            show_warning: true,
            sweep_interval_secs: LOCK_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ReservationConfig {
    /// Load reservation settings from environment variables.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `RESERVATION_LOCK_DURATION_MINS`  | `10`    |
    /// | `RESERVATION_SHOW_WARNING`        | `true`  |
    /// | `RESERVATION_SWEEP_INTERVAL_SECS` | `3600`  |
    ///
    /// # Panics
    ///
    /// Panics if any value is malformed or out of range.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
            .unwrap_or_else(|e| panic!("Invalid reservation configuration: {e}"))
    }

    /// Build from an arbitrary variable source; unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("RESERVATION_LOCK_DURATION_MINS") {
            let mins: i64 = raw.trim().parse().map_err(|_| ConfigError {
                name: "RESERVATION_LOCK_DURATION_MINS",
                value: raw.clone(),
                reason: "must be a whole number of minutes".into(),
            })?;
            validate_lock_duration(mins).map_err(|e| ConfigError {
                name: "RESERVATION_LOCK_DURATION_MINS",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            config.lock_duration_mins = mins;
        }

        if let Some(raw) = lookup("RESERVATION_SHOW_WARNING") {
            config.show_warning = parse_flag(&raw).ok_or_else(|| ConfigError {
                name: "RESERVATION_SHOW_WARNING",
                value: raw.clone(),
                reason: "must be true/false, yes/no or 1/0".into(),
            })?;
        }

        if let Some(raw) = lookup("RESERVATION_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError {
                    name: "RESERVATION_SWEEP_INTERVAL_SECS",
                    value: raw.clone(),
                    reason: "must be a positive number of seconds".into(),
                })?;
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
