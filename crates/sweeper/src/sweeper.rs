use std::time::Duration;

use lifecycle::LifecycleEngine;
use store::TicketStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How often the sweeper looks for overdue reservations.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic task that expires overdue reservations.
///
/// Each tick runs one sweep through the lifecycle engine. A failed sweep
/// is logged and the loop keeps ticking; overdue rows stay eligible until
/// a later sweep succeeds.
pub struct ExpirySweeper<S: TicketStore> {
    engine: LifecycleEngine<S>,
    interval: Duration,
}

/// Handle to a running sweeper task.
///
/// Call [`SweeperHandle::shutdown`] to stop the loop and wait for an
/// in-flight sweep to finish. Dropping the handle also stops the loop,
/// without the wait.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for its task to exit.
    pub async fn shutdown(self) {
        // The receiver is gone only if the task already exited.
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "sweeper task panicked");
        }
    }
}

impl<S: TicketStore + 'static> ExpirySweeper<S> {
    /// Creates a sweeper with the default one-minute interval.
    pub fn new(engine: LifecycleEngine<S>) -> Self {
        Self::with_interval(engine, DEFAULT_SWEEP_INTERVAL)
    }

    /// Creates a sweeper with a custom interval.
    pub fn with_interval(engine: LifecycleEngine<S>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Spawns the sweep loop and returns a handle for shutdown.
    ///
    /// The first sweep runs one full interval after spawning.
    pub fn spawn(self) -> SweeperHandle {
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // A slow sweep must not cause a burst of catch-up sweeps.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            tracing::info!(interval_secs = self.interval.as_secs(), "expiry sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    changed = stopped.changed() => {
                        // A closed channel means the handle was dropped.
                        if changed.is_err() || *stopped.borrow() {
                            tracing::info!("expiry sweeper stopping");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle { stop, task }
    }

    async fn sweep_once(&self) {
        match self.engine.sweep_expired().await {
            Ok(0) => {}
            Ok(expired) => {
                tracing::info!(expired, "sweep released overdue reservations");
            }
            Err(err) => {
                metrics::counter!("sweeper_failures_total").increment(1);
                tracing::error!(error = %err, "sweep failed, will retry next tick");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use common::{EventId, Money, UserId};
    use store::{CheckoutUnit, Event, MemoryStore, TicketStore, User};

    async fn seeded_overdue() -> (MemoryStore, EventId) {
        let store = MemoryStore::new();
        let organizer = UserId::new();
        let customer = UserId::new();
        store
            .insert_user(User {
                id: customer,
                referral_code: None,
                referred_by: None,
            })
            .await;
        let now = Utc::now();
        let event = Event {
            id: EventId::new(),
            organizer_id: organizer,
            name: "Eventix Live".to_string(),
            price: Money::from_minor(100_000),
            total_seats: 2,
            available_seats: 2,
            starts_at: now + ChronoDuration::days(7),
            ends_at: now + ChronoDuration::days(8),
        };
        let event_id = event.id;
        store.insert_event(event).await;

        store
            .checkout(CheckoutUnit {
                customer_id: customer,
                event_id,
                use_points: false,
                coupon_id: None,
                now: now - ChronoDuration::hours(3),
                expires_at: now - ChronoDuration::hours(1),
            })
            .await
            .unwrap();

        (store, event_id)
    }

    #[tokio::test]
    async fn sweeper_releases_overdue_seats() {
        let (store, event_id) = seeded_overdue().await;
        assert_eq!(store.available_seats(event_id).await, Some(1));

        let engine = LifecycleEngine::new(store.clone());
        let handle =
            ExpirySweeper::with_interval(engine, Duration::from_millis(20)).spawn();

        // Give the loop a few ticks.
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.shutdown().await;

        assert_eq!(store.available_seats(event_id).await, Some(2));
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let store = MemoryStore::new();
        let engine = LifecycleEngine::new(store);
        let handle =
            ExpirySweeper::with_interval(engine, Duration::from_millis(10)).spawn();

        // Must return rather than hang on the ticking task.
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown did not complete");
    }

    #[tokio::test]
    async fn sweep_does_not_run_before_the_first_interval() {
        let (store, event_id) = seeded_overdue().await;

        let engine = LifecycleEngine::new(store.clone());
        let handle = ExpirySweeper::with_interval(engine, Duration::from_secs(3600)).spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.available_seats(event_id).await, Some(1));

        handle.shutdown().await;
    }
}
