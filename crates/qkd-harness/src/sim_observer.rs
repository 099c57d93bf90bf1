//! Recording observer with injectable send failures.

use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use qkd_proto::{StageMessage, StageStatus};
use qkd_server::{Observer, TransportError};

#[derive(Debug, Default)]
struct Inbox {
    messages: Mutex<Vec<StageMessage>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

/// Observer that records every message it accepts.
///
/// Clones share the inbox, so a test keeps one handle while the hub holds
/// another. While failing, sends are counted but not recorded.
#[derive(Debug, Clone, Default)]
pub struct SimObserver {
    inbox: Arc<Inbox>,
}

impl SimObserver {
    /// New healthy observer with an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer whose every send fails.
    pub fn failing() -> Self {
        let observer = Self::new();
        observer.set_failing(true);
        observer
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.inbox.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages accepted so far, in delivery order.
    pub fn received(&self) -> Vec<StageMessage> {
        self.messages().clone()
    }

    /// Status of each accepted message, in delivery order.
    pub fn statuses(&self) -> Vec<StageStatus> {
        self.messages().iter().map(StageMessage::status).collect()
    }

    /// Send attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.inbox.attempts.load(Ordering::SeqCst)
    }

    fn messages(&self) -> MutexGuard<'_, Vec<StageMessage>> {
        self.inbox.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, message: StageMessage) -> Result<(), TransportError> {
        self.inbox.attempts.fetch_add(1, Ordering::SeqCst);

        if self.inbox.failing.load(Ordering::SeqCst) {
            tracing::trace!(status = ?message.status(), "simulated send failure");
            return Err(TransportError::Rejected("simulated send failure".to_string()));
        }

        self.messages().push(message);
        Ok(())
    }
}

impl Observer for SimObserver {
    fn send(
        &self,
        message: &StageMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let observer = self.clone();
        let message = message.clone();

        // Yield first so concurrent tasks get a chance to interleave with a
        // broadcast in flight
        async move {
            tokio::task::yield_now().await;
            observer.deliver(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_in_order() {
        let observer = SimObserver::new();

        observer.send(&StageMessage::initializing(false)).await.unwrap();
        observer.send(&StageMessage::complete("1".to_string(), 0.0)).await.unwrap();

        assert_eq!(observer.statuses(), vec![StageStatus::Initializing, StageStatus::Complete]);
        assert_eq!(observer.attempts(), 2);
    }

    #[tokio::test]
    async fn failing_observer_counts_but_does_not_record() {
        let observer = SimObserver::failing();

        let result = observer.send(&StageMessage::initializing(true)).await;

        assert!(matches!(result, Err(TransportError::Rejected(_))));
        assert_eq!(observer.attempts(), 1);
        assert!(observer.received().is_empty());
    }

    #[tokio::test]
    async fn clones_share_inbox_and_failure_flag() {
        let observer = SimObserver::new();
        let handle = observer.clone();

        handle.set_failing(true);

        assert!(observer.send(&StageMessage::initializing(false)).await.is_err());
        assert_eq!(handle.attempts(), 1);
    }
}
