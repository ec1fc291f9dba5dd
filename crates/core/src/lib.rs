//! Reservation lock engine: domain types, the lock store contract, and the
//! coordinator policy layer.
//!
//! This crate has zero internal deps so that the persistence layer, the HTTP
//! surface, and background tasks all share the same types and rules.

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod reservation;
pub mod roles;
pub mod store;
pub mod types;
