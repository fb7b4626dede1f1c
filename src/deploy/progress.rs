//! Progress events, sinks and cancellation.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use super::ItemState;

/// Emitted on every state transition of every item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployEvent {
    /// Original identifier of the item
    pub item_id: String,
    /// Kind tag of the item
    pub kind: String,
    /// State the item just entered
    pub status: ItemState,
    /// Cost-weighted completion of the whole run, `0.0..=1.0`
    pub progress: f64,
    /// Failure reason for [`ItemState::Failed`], new id for [`ItemState::Done`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Receiver of [`DeployEvent`]s. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// Called once per transition.
    fn on_event(&self, event: &DeployEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_event(&self, _event: &DeployEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&DeployEvent) + Send + Sync,
{
    fn on_event(&self, event: &DeployEvent) {
        self(event);
    }
}

impl ProgressSink for mpsc::UnboundedSender<DeployEvent> {
    fn on_event(&self, event: &DeployEvent) {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.send(event.clone());
    }
}

/// Cooperative cancellation flag shared between a run and its caller.
///
/// The driver checks it between transitions. Items that have not finished
/// when it is set fail with [`SolkitError::Cancelled`](crate::core::SolkitError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// New, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(status: ItemState) -> DeployEvent {
        DeployEvent {
            item_id: "a".into(),
            kind: "Web Map".into(),
            status,
            progress: 0.5,
            message: None,
        }
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |e: &DeployEvent| seen.lock().unwrap().push(e.status);
        sink.on_event(&event(ItemState::Creating));
        sink.on_event(&event(ItemState::Done));
        assert_eq!(*seen.lock().unwrap(), vec![ItemState::Creating, ItemState::Done]);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.on_event(&event(ItemState::Failed));
        assert_eq!(rx.recv().await.unwrap().status, ItemState::Failed);

        drop(rx);
        // Sending after the receiver is gone is silently ignored
        tx.on_event(&event(ItemState::Done));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
