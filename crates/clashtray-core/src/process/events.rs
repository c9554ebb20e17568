//! Lifecycle events and their delivery to subscribers.

use crate::config::SupervisorConfig;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Identifies one `start` of the supervisor. Increases with every start.
pub type RunId = u64;

/// A lifecycle transition of a supervised run.
///
/// Per run: at most one `Started`, followed by at most one terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The child was still alive when the grace period elapsed.
    Started { run: RunId, pid: Option<u32> },
    /// The child exited normally, or exited after a stop request.
    Finished { run: RunId, exit_code: Option<i32> },
    /// The child was confirmed running, then terminated abnormally.
    Crashed {
        run: RunId,
        exit: String,
        diagnostic: String,
    },
    /// The child could not be spawned, or exited before it was confirmed running.
    FailedToStart { run: RunId, diagnostic: String },
}

impl LifecycleEvent {
    pub fn run(&self) -> RunId {
        match self {
            LifecycleEvent::Started { run, .. }
            | LifecycleEvent::Finished { run, .. }
            | LifecycleEvent::Crashed { run, .. }
            | LifecycleEvent::FailedToStart { run, .. } => *run,
        }
    }

    /// Finished, Crashed and FailedToStart end a run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LifecycleEvent::Started { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Started { .. } => "started",
            LifecycleEvent::Finished { .. } => "finished",
            LifecycleEvent::Crashed { .. } => "crashed",
            LifecycleEvent::FailedToStart { .. } => "failed-to-start",
        }
    }
}

/// Fan-out of lifecycle events to every current subscriber.
///
/// Nothing is stored: an event emitted while nobody is subscribed is dropped,
/// and a new subscriber only sees events emitted after it subscribed.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new(SupervisorConfig::EVENT_CHANNEL_CAPACITY)
    }
}

impl StatusNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        debug!(run = event.run(), kind = event.kind(), "Emitting lifecycle event");
        if self.tx.send(event).is_err() {
            debug!("No subscribers for lifecycle event");
        }
    }
}

/// Receiving end of a [`StatusNotifier`].
#[derive(Debug)]
pub struct StatusSubscription {
    rx: broadcast::Receiver<LifecycleEvent>,
}

impl StatusSubscription {
    /// Wait for the next event. Returns `None` once the notifier is gone.
    ///
    /// A subscriber that falls more than the channel capacity behind skips
    /// the overwritten events and continues with the oldest retained one.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Status subscriber lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Status subscriber lagged, {} events skipped", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_delivered_in_order_to_all_subscribers() {
        let notifier = StatusNotifier::default();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.emit(LifecycleEvent::Started { run: 1, pid: Some(42) });
        notifier.emit(LifecycleEvent::Finished {
            run: 1,
            exit_code: Some(0),
        });

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.recv().await.map(|e| e.kind()), Some("started"));
            assert_eq!(sub.recv().await.map(|e| e.kind()), Some("finished"));
        }
    }

    #[test]
    fn test_events_without_subscribers_are_lost() {
        let notifier = StatusNotifier::default();
        notifier.emit(LifecycleEvent::FailedToStart {
            run: 1,
            diagnostic: "boom".into(),
        });

        let mut late = notifier.subscribe();
        assert!(late.try_recv().is_none());
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!LifecycleEvent::Started { run: 3, pid: None }.is_terminal());
        let crashed = LifecycleEvent::Crashed {
            run: 3,
            exit: "signal 9".into(),
            diagnostic: String::new(),
        };
        assert!(crashed.is_terminal());
        assert_eq!(crashed.run(), 3);
        assert_eq!(crashed.kind(), "crashed");
    }
}
