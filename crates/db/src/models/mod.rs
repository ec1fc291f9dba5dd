pub mod reservation_lock;
