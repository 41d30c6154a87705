//! Single-slot observable value with explicit subscriptions.
//!
//! # Design
//! Each subscriber owns an unbounded channel. `publish` stores the new value
//! and pushes a clone into every live channel while holding the slot lock, so
//! every subscriber sees updates in publish order and a new subscriber can
//! never miss a value published between "read latest" and "register".
//! A subscription ends when its handle is dropped or `unsubscribe`d; dead
//! channels are pruned on the next publish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one subscription within its `ObservableValue`.
pub type SubscriptionId = u64;

struct Slot<T> {
    latest: Option<T>,
    next_id: SubscriptionId,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<T>>,
}

/// Holds the latest published value and fans updates out to subscribers.
///
/// Cloning yields another handle to the same slot.
pub struct ObservableValue<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone> Default for ObservableValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ObservableValue<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                latest: None,
                next_id: 1,
                subscribers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // A panicking subscriber cannot corrupt the slot; keep serving.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The most recently published value, if any.
    pub fn latest(&self) -> Option<T> {
        self.lock().latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Register a subscriber. It first receives the latest value (when one
    /// exists) and then every later publish.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.lock();
        let id = slot.next_id;
        slot.next_id += 1;
        if let Some(latest) = &slot.latest {
            let _ = tx.send(latest.clone());
        }
        slot.subscribers.insert(id, tx);
        debug!(id, subscribers = slot.subscribers.len(), "ObservableValue::subscribe");
        Subscription {
            id,
            rx,
            slot: Arc::downgrade(&self.slot),
        }
    }

    /// Remove a subscriber by id. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        debug!(id, removed, "ObservableValue::unsubscribe");
        removed
    }

    /// Store `value` as the latest and deliver it to every subscriber.
    /// Valid with zero subscribers.
    pub(crate) fn publish(&self, value: T) {
        let mut slot = self.lock();
        slot.subscribers.retain(|_, tx| tx.send(value.clone()).is_ok());
        slot.latest = Some(value);
    }
}

/// Receiving end of one subscription.
pub struct Subscription<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
    slot: std::sync::Weak<Mutex<Slot<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next value. `None` once unsubscribed from elsewhere or
    /// once the observable is gone and all buffered values are drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next buffered value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// End the subscription now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            let mut slot = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.subscribers.remove(&self.id);
        }
    }
}
