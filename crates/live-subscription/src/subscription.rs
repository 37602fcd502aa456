//! Release-once subscription handles.

use std::fmt;

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// Handle for one registered listener.
///
/// The release action runs exactly once: on [`unsubscribe`](Self::unsubscribe)
/// or on drop, whichever comes first.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    label: String,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Create a handle that runs `release` when it is released.
    pub fn new(label: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            release: None,
        }
    }

    /// Diagnostic label, e.g. `todos:INSERT`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True until the handle has been released.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Release the registration now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::trace!(label = %self.label, "releasing subscription");
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Handles acquired together and released together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    handles: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.handles.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.handles.iter().map(Subscription::label).collect()
    }

    /// Release every handle in acquisition order and return how many were
    /// still active.
    pub fn release_all(mut self) -> usize {
        let mut released = 0;
        for handle in self.handles.drain(..) {
            if handle.is_active() {
                released += 1;
            }
            handle.unsubscribe();
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(label: &str, counter: &Arc<AtomicUsize>) -> Subscription {
        let counter = counter.clone();
        Subscription::new(label, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_unsubscribe_runs_release_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = counting("todos:INSERT", &count);
        assert!(sub.is_active());

        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _sub = counting("posts:INSERT", &count);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_is_inactive() {
        let sub = Subscription::noop("nothing");
        assert!(!sub.is_active());
        sub.unsubscribe();
    }

    #[test]
    fn test_set_release_all_counts_active_handles() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut set = SubscriptionSet::new();
        set.push(counting("todos:INSERT", &count));
        set.push(counting("todos:UPDATE", &count));
        set.push(Subscription::noop("todos:noop"));
        assert_eq!(set.labels(), vec!["todos:INSERT", "todos:UPDATE", "todos:noop"]);

        assert_eq!(set.release_all(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropping_set_releases_everything_once() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let mut set = SubscriptionSet::new();
            set.push(counting("a", &count));
            set.push(counting("b", &count));
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
