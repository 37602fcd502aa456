//! Authentication bridge for todo-feed.
//!
//! This crate provides:
//! - the [`SessionProvider`] seam and its Supabase implementation
//! - [`AuthContext`], which mirrors the provider's session into one snapshot
//!   and forwards every change to an [`AuditSink`]
//! - route guarding for the signed-in and anonymous pages
//! - an explicit FSM for the authenticated/anonymous state

mod audit;
mod auth_fsm;
mod context;
mod error;
mod provider;
mod routes;
mod session_store;
mod supabase_auth;
mod types;

pub use audit::{AuditRecord, AuditSink, HttpAuditSink, NullAuditSink, RecordingAuditSink};
pub use auth_fsm::auth_machine;
pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState};
pub use context::{AuthContext, AuthSnapshot};
pub use error::{AuthError, AuthResult};
pub use provider::{MemorySessionProvider, SessionHandler, SessionProvider};
pub use routes::{guard, Navigator, RecordingNavigator, Route, RouteDecision};
pub use session_store::SessionFileStore;
pub use supabase_auth::SupabaseAuth;
pub use types::{ProviderConfig, Session, SessionChange, SessionEvent, User};
