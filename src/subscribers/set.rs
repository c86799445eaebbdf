//! # SubscriberSet: per-subscriber delivery lanes.
//!
//! Every subscriber gets a lane: a bounded queue and a worker task draining it
//! into [`Subscribe::on_event`]. [`SubscriberSet::emit`] only ever calls
//! `try_send`, so the supervisor and the compile reader never wait on a viewer.
//!
//! ```text
//!  emit(&Event) ─┬─ wants? ─► [lane: viewer] ─► worker ─► on_event
//!                ├─ wants? ─► [lane: audit ] ─► worker ─► on_event
//!                └─ wants? ─► [lane: log   ] ─► worker ─► on_event
//! ```
//!
//! ## Full lanes
//! Compile output arrives in bursts. A `CompileOutput` line that does not fit
//! is counted, not reported: the lane later delivers one
//! `CompileOutputSkipped { skipped: n }` in place of the missing lines, before
//! anything newer. Any other event that does not fit is dropped for that lane
//! and published on the bus as `SubscriberOverflow`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use plcvisor::{Bus, Event, EventKind, Subscribe, SubscriberSet};
//!
//! struct LiveLog;
//!
//! #[async_trait]
//! impl Subscribe for LiveLog {
//!     async fn on_event(&self, ev: &Event) {
//!         // push ev.line to connected browsers
//!         let _ = ev;
//!     }
//!     fn name(&self) -> &'static str { "live-log" }
//!     fn wants(&self, kind: EventKind) -> bool { kind == EventKind::CompileOutput }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let set = SubscriberSet::new(vec![Arc::new(LiveLog)], Bus::new(16));
//! set.emit(&Event::new(EventKind::CompileOutput).with_line("Compiling main.st\n"));
//! set.shutdown().await;
//! # }
//! ```

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// One subscriber's queue plus its count of dropped output lines.
struct Lane {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
    skipped: AtomicU64,
}

impl Lane {
    fn name(&self) -> &'static str {
        self.sub.name()
    }

    fn accepts(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::CompileOutputSkipped => self.sub.wants(EventKind::CompileOutput),
            kind => self.sub.wants(kind),
        }
    }

    fn deliver(&self, ev: &Arc<Event>, bus: &Bus) {
        let is_line = ev.kind == EventKind::CompileOutput;

        // A pending gap marker goes first so the subscriber sees it in place.
        let pending = self.skipped.load(Ordering::Relaxed);
        if pending > 0 {
            let marker = Arc::new(Event::compile_output_skipped(self.name(), pending));
            if self.tx.try_send(marker).is_ok() {
                self.skipped.fetch_sub(pending, Ordering::Relaxed);
                tracing::warn!(subscriber = self.name(), lines = pending, "compile output skipped");
            } else if is_line {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        match self.tx.try_send(Arc::clone(ev)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) if is_line => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => self.overflow(ev, bus, "full"),
            Err(TrySendError::Closed(_)) => self.overflow(ev, bus, "closed"),
        }
    }

    fn overflow(&self, ev: &Event, bus: &Bus, reason: &'static str) {
        // Overflow notices that do not fit are not re-reported.
        if ev.is_subscriber_overflow() {
            return;
        }
        tracing::warn!(subscriber = self.name(), kind = ?ev.kind, reason, "event dropped");
        bus.publish(Event::subscriber_overflow(self.name(), reason));
    }
}

/// Fans events out to subscriber lanes without waiting on any of them.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Starts one worker per subscriber. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(run_worker(Arc::clone(&sub), rx, bus.clone()));
                let lane = Lane {
                    sub,
                    tx,
                    skipped: AtomicU64::new(0),
                };
                (lane, worker)
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Queues `event` on every lane that wants it.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for lane in self.lanes.iter().filter(|l| l.accepts(ev.kind)) {
            lane.deliver(&ev, &self.bus);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Closes every lane and waits until workers have handled what was queued.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = panic_message(payload.as_ref());
            tracing::warn!(subscriber = sub.name(), %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
