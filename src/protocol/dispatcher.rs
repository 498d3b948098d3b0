use crate::core::packet::Packet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type ListenerFn = dyn Fn(&Packet) + Send + Sync + 'static;

/// Handle returned by [`Listeners::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Observer list for "message arrived" notifications.
///
/// Delivery works on a snapshot of the list taken under the read lock, so
/// listeners may subscribe or unsubscribe (even themselves) while a
/// notification is in progress.
pub struct Listeners {
    handlers: RwLock<Vec<(ListenerId, Arc<ListenerFn>)>>,
    next_id: AtomicU64,
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Deliver `packet` to every listener in subscription order.
    /// Returns the number of listeners invoked.
    pub fn notify(&self, packet: &Packet) -> usize {
        let snapshot: Vec<Arc<ListenerFn>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &snapshot {
            handler(packet);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn delivers_in_subscription_order() {
        let listeners = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            listeners.subscribe(move |_| seen.lock().unwrap_or_else(PoisonError::into_inner).push(tag));
        }

        assert_eq!(listeners.notify(&Packet::data("x")), 2);
        assert_eq!(*seen.lock().unwrap_or_else(PoisonError::into_inner), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_removes_only_target() {
        let listeners = Listeners::new();
        let a = listeners.subscribe(|_| {});
        let _b = listeners.subscribe(|_| {});

        assert!(listeners.unsubscribe(a));
        assert!(!listeners.unsubscribe(a));
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_during_delivery() {
        let listeners = Arc::new(Listeners::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let id = {
            let listeners_ref = Arc::clone(&listeners);
            let slot = Arc::clone(&slot);
            listeners.subscribe(move |_| {
                if let Some(id) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    listeners_ref.unsubscribe(id);
                }
            })
        };
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);

        assert_eq!(listeners.notify(&Packet::data("once")), 1);
        assert!(listeners.is_empty());
        assert_eq!(listeners.notify(&Packet::data("twice")), 0);
    }
}
