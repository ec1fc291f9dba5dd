//! Periodic removal of expired reservation locks.
//!
//! Expired rows are already inert for every decision; the sweep only keeps
//! the table from growing. Runs on a fixed interval using
//! `tokio::time::interval`, so the first sweep happens at startup.

use std::sync::Arc;
use std::time::Duration;

use reslock_core::coordinator::ReservationCoordinator;
use tokio_util::sync::CancellationToken;

/// Run the expired-lock sweep loop until `cancel` is triggered.
///
/// A failed sweep is logged and retried on the next tick.
pub async fn run(
    coordinator: Arc<ReservationCoordinator>,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Lock sweep job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                match coordinator.sweep().await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "Lock sweep: removed expired locks");
                    }
                    Ok(_) => tracing::debug!("Lock sweep: nothing expired"),
                    Err(e) => tracing::error!(error = %e, "Lock sweep failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use reslock_core::clock::ManualClock;
    use reslock_core::memory::MemoryLockStore;
    use reslock_core::reservation::{LockKey, LockOwner};

    use super::*;

    #[tokio::test]
    async fn test_sweeps_expired_locks_until_cancelled() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let store = Arc::new(MemoryLockStore::new());
        let clock = Arc::new(ManualClock::new(t0));
        let coordinator = Arc::new(
            ReservationCoordinator::with_clock(store.clone(), clock.clone(), 10).unwrap(),
        );

        coordinator
            .try_acquire(LockKey::resource(1), &LockOwner::guest("a"), 5)
            .await
            .unwrap();
        coordinator
            .try_acquire(LockKey::resource(2), &LockOwner::guest("b"), 30)
            .await
            .unwrap();
        clock.advance(ChronoDuration::minutes(6));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&coordinator),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while store.row_count().await != 1 {
            assert!(tokio::time::Instant::now() < deadline, "sweep did not run");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep task should stop on cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_stop_loop() {
        let store = Arc::new(MemoryLockStore::new());
        let coordinator = Arc::new(ReservationCoordinator::new(store.clone(), 10).unwrap());
        store.set_unavailable(true);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(coordinator, Duration::from_millis(5), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep task should stop on cancel")
            .unwrap();
    }
}
