//! Supabase backend for the todo-feed row store.
//!
//! [`SupabaseRestClient`] talks to PostgREST, [`realtime::RealtimeClient`]
//! keeps one Phoenix channel per table, and [`SupabaseRowStore`] puts both
//! behind the [`collection_sync::RowStore`] seam.

mod client;
mod error;
pub mod realtime;
mod row_store;
mod token;

pub use client::SupabaseRestClient;
pub use error::{RealtimeError, RealtimeResult, SupabaseError, SupabaseResult};
pub use realtime::{ConnectionState, RealtimeClient, RealtimeConfig};
pub use row_store::SupabaseRowStore;
pub use token::AccessTokenSource;
