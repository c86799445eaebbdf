use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use super::{config::SupervisorConfig, supervisor::Supervisor};
use crate::{
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`] with optional subscribers.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime and compile events through dedicated
    /// workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor and starts the subscriber listener.
    ///
    /// Must be called from within a tokio runtime. The engine is not started;
    /// the session begins `Stopped`.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        let set = SubscriberSet::new(self.subscribers, bus.clone());
        let listener = tokio::spawn(subscriber_listener(set, bus.subscribe(), token.clone()));

        Arc::new(Supervisor::new_internal(self.cfg, bus, token, listener))
    }
}

/// Forwards bus events to the subscriber set until cancelled.
async fn subscriber_listener(
    set: SubscriberSet,
    mut rx: broadcast::Receiver<Event>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    // Deliver what is already on the bus before the workers close.
    while let Ok(ev) = rx.try_recv() {
        set.emit(&ev);
    }
    set.shutdown().await;
}
