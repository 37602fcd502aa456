//! Listener registry handing out [`Subscription`]s.

use crate::Subscription;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Callback invoked for every emitted event.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Inner<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Registry of listeners for events of type `E`.
///
/// Cloning is cheap and clones share the same listener list.
pub struct ListenerRegistry<E> {
    inner: Arc<Mutex<Inner<E>>>,
    name: Arc<str>,
}

impl<E> Clone for ListenerRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: self.name.clone(),
        }
    }
}

impl<E: 'static> ListenerRegistry<E> {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
            })),
            name: Arc::from(name),
        }
    }

    /// Add a listener. Releasing the returned handle removes it.
    pub fn register(&self, listener: Listener<E>) -> Subscription {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak: Weak<Mutex<Inner<E>>> = Arc::downgrade(&self.inner);
        Subscription::new(format!("{}#{}", self.name, id), move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    /// Call every listener registered at the time of the call, in
    /// registration order, and return how many were called.
    ///
    /// The lock is not held while listeners run, so a listener may register
    /// or release subscriptions on this registry.
    pub fn emit(&self, event: &E) -> usize {
        let listeners: Vec<Listener<E>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_registered_listeners_in_order() {
        let registry = ListenerRegistry::<u32>::new("numbers");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            registry.register(Arc::new(move |n: &u32| seen.lock().push(("first", *n))))
        };
        let second = {
            let seen = seen.clone();
            registry.register(Arc::new(move |n: &u32| seen.lock().push(("second", *n))))
        };

        assert_eq!(registry.emit(&7), 2);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);

        first.unsubscribe();
        second.unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_released_listener_stops_receiving() {
        let registry = ListenerRegistry::<()>::new("unit");
        let count = Arc::new(AtomicUsize::new(0));

        let sub = {
            let count = count.clone();
            registry.register(Arc::new(move |_: &()| {
                count.fetch_add(1, Ordering::SeqCst);
            }))
        };

        registry.emit(&());
        sub.unsubscribe();
        assert_eq!(registry.emit(&()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_outliving_registry_is_harmless() {
        let registry = ListenerRegistry::<()>::new("short-lived");
        let sub = registry.register(Arc::new(|_: &()| {}));
        drop(registry);
        sub.unsubscribe();
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let registry = ListenerRegistry::<()>::new("reentrant");
        let held = Arc::new(Mutex::new(Vec::new()));

        let _outer = {
            let registry = registry.clone();
            let held = held.clone();
            registry.clone().register(Arc::new(move |_: &()| {
                held.lock().push(registry.register(Arc::new(|_: &()| {})));
            }))
        };

        assert_eq!(registry.emit(&()), 1);
        assert_eq!(registry.len(), 2);
    }
}
