pub mod reservation_lock_repo;

pub use reservation_lock_repo::{AcquireResult, ReservationLockRepo};
