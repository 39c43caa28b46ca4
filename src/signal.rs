//! Store-wide change notifications.
//!
//! A byte store fires one zero-payload signal after every successful write,
//! whatever the key. Receivers cannot tell which key changed; they re-read
//! and compare.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// Default channel capacity for change notifiers.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 1024;

/// Receiving side of a store-wide change signal.
///
/// Signals coalesce: any number of notifications queued since the last
/// receive are consumed together. Lagging behind the channel is treated as
/// "something changed" rather than an error.
pub struct ChangeSignal {
    receiver: broadcast::Receiver<()>,
    closed: bool,
}

impl ChangeSignal {
    /// Wrap a broadcast receiver.
    pub fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self {
            receiver,
            closed: false,
        }
    }

    /// Wait for the next change.
    ///
    /// Returns `false` once every notifier has been dropped.
    pub async fn recv(&mut self) -> bool {
        if self.closed {
            return false;
        }
        match self.receiver.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                self.drain();
                true
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.closed = true;
                false
            }
        }
    }

    /// Consume every already-queued signal without waiting.
    ///
    /// Returns `true` if at least one signal was pending.
    pub fn drain(&mut self) -> bool {
        let mut fired = false;
        loop {
            match self.receiver.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => fired = true,
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.closed = true;
                    break;
                }
            }
        }
        fired
    }

    /// Whether the notifier side is gone.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Turn this signal into a stream of change ticks, for hosts that
    /// `select!` over several event sources.
    pub fn into_stream(self) -> impl Stream<Item = ()> + Send {
        BroadcastStream::new(self.receiver).map(|_| ())
    }
}

/// Sending side of a store-wide change signal.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<()>,
}

impl ChangeNotifier {
    /// Create a notifier with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire the signal to all current subscribers.
    pub fn notify(&self) {
        // No subscribers is fine
        let _ = self.sender.send(());
    }

    /// Subscribe to future signals.
    pub fn subscribe(&self) -> ChangeSignal {
        ChangeSignal::new(self.sender.subscribe())
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_reaches_subscriber() {
        let notifier = ChangeNotifier::new(16);
        let mut signal = notifier.subscribe();

        notifier.notify();
        assert!(signal.recv().await);
    }

    #[test]
    fn test_drain_coalesces() {
        let notifier = ChangeNotifier::new(16);
        let mut signal = notifier.subscribe();

        assert!(!signal.drain());
        notifier.notify();
        notifier.notify();
        notifier.notify();
        assert!(signal.drain());
        assert!(!signal.drain());
    }

    #[test]
    fn test_lagged_counts_as_change() {
        let notifier = ChangeNotifier::new(2);
        let mut signal = notifier.subscribe();

        for _ in 0..10 {
            notifier.notify();
        }
        assert!(signal.drain());
        assert!(!signal.drain());
    }

    #[tokio::test]
    async fn test_closed_when_notifier_dropped() {
        let notifier = ChangeNotifier::new(4);
        let mut signal = notifier.subscribe();
        drop(notifier);

        assert!(!signal.recv().await);
        assert!(signal.is_closed());
    }

    #[test]
    fn test_subscriber_count() {
        let notifier = ChangeNotifier::new(4);
        assert_eq!(notifier.subscriber_count(), 0);

        let a = notifier.subscribe();
        let _b = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        drop(a);
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let notifier = ChangeNotifier::new(4);
        let mut stream = Box::pin(notifier.subscribe().into_stream());

        notifier.notify();
        assert_eq!(stream.next().await, Some(()));

        drop(notifier);
        assert_eq!(stream.next().await, None);
    }
}
