//! Simulation clock with broadcast tick fan-out
//!
//! Every long-lived actor that advances with time (road lines, the road
//! generator) subscribes to the clock and receives every tick in order.
//! Tests drive the clock manually; the demo binary runs a periodic driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Simulation time unit (monotonic tick counter)
pub type Tick = u64;

/// Shared tick source. Cheap to clone; all clones feed the same stream.
#[derive(Debug, Clone)]
pub struct Clock {
    tx: broadcast::Sender<Tick>,
    counter: Arc<AtomicU64>,
}

impl Clock {
    /// `capacity` bounds how many ticks a slow subscriber may fall behind
    /// before it starts observing lag.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to ticks emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Tick> {
        self.tx.subscribe()
    }

    /// Advance time by one tick and fan it out to all subscribers.
    pub fn tick(&self) -> Tick {
        let tick = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        // No subscribers is fine; ticks are fire-and-forget
        let _ = self.tx.send(tick);
        tick
    }

    /// Current tick count (the last tick emitted).
    pub fn now(&self) -> Tick {
        self.counter.load(Ordering::Relaxed)
    }

    /// Spawn a task that ticks at a fixed wall-clock period.
    pub fn spawn_driver(&self, period: Duration) -> JoinHandle<()> {
        let clock = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                clock.tick();
            }
        })
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_ticks_in_order() {
        let clock = Clock::new(16);
        let mut rx = clock.subscribe();

        clock.tick();
        clock.tick();
        clock.tick();

        assert_eq!(rx.recv().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), 3);
        assert_eq!(clock.now(), 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_ticks() {
        let clock = Clock::new(16);
        clock.tick();

        let mut rx = clock.subscribe();
        clock.tick();
        assert_eq!(rx.recv().await.unwrap(), 2);
    }
}
