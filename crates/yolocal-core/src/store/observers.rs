// Synchronous observer list.

use std::sync::{Arc, Mutex, PoisonError};

use super::device_store::StateSnapshot;

/// Handle returned by [`DeviceStore::add_observer`](super::DeviceStore::add_observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type Observer = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

/// Observers in registration order.
///
/// `notify` copies the list before calling out, so an observer may add
/// or remove observers without deadlocking.
#[derive(Default)]
pub(crate) struct ObserverList {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

impl ObserverList {
    pub(crate) fn add(&self, observer: Observer) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.entries.len();
        inner.entries.retain(|(entry, _)| *entry != id);
        inner.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub(crate) fn notify(&self, snapshot: &StateSnapshot) {
        let observers: Vec<Observer> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer(snapshot);
        }
    }
}
