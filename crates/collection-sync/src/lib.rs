//! Live collections for the todos and feed views.
//!
//! A view is seeded once from a point-in-time query and then kept current by
//! the row store's change events:
//!
//! - [`RowStore`] is the storage seam (query, change subscriptions, writes);
//! - [`CollectionSynchronizer`] applies inserts, updates and deletes to the
//!   seeded rows and owns the change subscriptions;
//! - [`FeedView`] and [`TodosView`] add the draft/submit and todo actions.
//!
//! [`MemoryRowStore`] is an in-process store whose events are delivered on
//! demand.

mod change;
mod error;
mod memory;
mod row;
mod store;
mod synchronizer;
mod views;

pub use change::{ChangeHandler, ChangeKind, ChangePayload, RowChange};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryRowStore, WriteRecord};
pub use row::{NewPost, NewTodo, Post, PostPatch, Row, RowId, RowPatch, Todo, TodoPatch};
pub use store::{load_seed, Query, QueryOrder, RowStore};
pub use synchronizer::{Collection, CollectionSynchronizer};
pub use views::{FeedView, SubmitOutcome, TodosView};
