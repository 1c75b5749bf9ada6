//! Recurring draft persistence.
//!
//! The scheduler owns at most one interval task. Each tick hands a save to
//! its own task so that a slow save never delays the clock; overlapping
//! saves are turned away by the sink's in-progress flag.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{wlog_debug, wlog_trace};

/// Receiver of autosave ticks.
#[async_trait]
pub trait DraftSink: Send + Sync + 'static {
    async fn autosave_tick(self: Arc<Self>);
}

/// Cancellable interval task driving a `DraftSink`.
#[derive(Debug, Default)]
pub struct AutosaveScheduler {
    cancel: Option<CancellationToken>,
    interval: Option<Duration>,
}

impl AutosaveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, first disarming any previous one.
    ///
    /// The first tick fires one full `interval` after arming. The task holds
    /// only a weak reference and exits once the sink is gone.
    /// Must be called from within a tokio runtime.
    pub fn start<S: DraftSink>(&mut self, interval: Duration, sink: Weak<S>) {
        self.stop();

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        wlog_debug!("AutosaveScheduler::start interval={:?}", interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => {
                        wlog_debug!("AutosaveScheduler cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(sink) = sink.upgrade() else {
                            wlog_debug!("AutosaveScheduler: sink dropped");
                            break;
                        };
                        wlog_trace!("AutosaveScheduler tick");
                        tokio::spawn(sink.autosave_tick());
                    }
                }
            }
        });

        self.cancel = Some(cancel);
        self.interval = Some(interval);
    }

    /// Disarm the timer. Safe to call when not running; returns whether a
    /// timer was actually stopped.
    pub fn stop(&mut self) -> bool {
        self.interval = None;
        match self.cancel.take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
