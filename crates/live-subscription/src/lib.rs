//! Subscription handles for callback-style event sources.
//!
//! Every `subscribe`-like call in the workspace (session changes, row change
//! events, realtime channels) hands back a [`Subscription`]. The handle owns
//! the release action for that registration:
//!
//! - [`Subscription::unsubscribe`] releases it explicitly;
//! - dropping an unreleased handle releases it too.
//!
//! Either way the action runs once. Owners that acquire several handles on
//! activation keep them in a [`SubscriptionSet`] so that an early return
//! halfway through activation still releases what was acquired.

mod registry;
mod subscription;

pub use registry::{Listener, ListenerRegistry};
pub use subscription::{Subscription, SubscriptionSet};
