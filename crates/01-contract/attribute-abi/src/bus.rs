use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// Fan-out event stream owned by a single manager.
///
/// Every subscriber gets its own unbounded channel, so publishing never
/// blocks the publisher. Subscribers that dropped their receiver are pruned
/// on the next publish.
pub struct EventBus<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E: Clone + Send> EventBus<E> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber.
    pub fn publish(&self, event: E) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of subscribers still connected as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone + Send> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
