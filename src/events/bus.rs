//! # Bus: where every supervisor event is published.
//!
//! Publishers are the supervisor itself, each compile job and its reaper, and
//! the blocking log reader thread (`publish` is a plain synchronous call, so
//! it works from `spawn_blocking` too). The builder's listener is the main
//! receiver and hands events to the `SubscriberSet`; tests and live viewers
//! can take their own receiver with [`Bus::subscribe`].
//!
//! Delivery is best effort. One ring buffer of `capacity` events is shared by
//! all receivers; a receiver that falls behind gets `RecvError::Lagged(n)`
//! and resumes at the oldest event still buffered.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the broadcast channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to current receivers; dropped silently when there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_without_receivers_is_dropped() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::RuntimeStarted));
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_receiver_sees_events_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::CompileStarted));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::RuntimeStarted));
        bus.publish(Event::new(EventKind::RuntimeStopped));

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::RuntimeStarted);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::RuntimeStopped);
    }

    #[tokio::test]
    async fn test_slow_receiver_lags_on_output_burst() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(Event::new(EventKind::CompileOutput));
        }
        bus.publish(Event::new(EventKind::CompileFinished));

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(4))));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::CompileOutput);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::CompileFinished);
    }
}
