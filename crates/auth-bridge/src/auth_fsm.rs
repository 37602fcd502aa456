//! Authentication state machine using rust-fsm.
//!
//! The hosted auth service owns every intermediate step of a login, so the
//! client only ever observes two states:
//!
//! ```text
//!              SessionStarted
//!   ┌───────────┐ ──────────────► ┌───────────────┐
//!   │ Anonymous │                 │ Authenticated │ ◄─┐ SessionStarted
//!   └───────────┘ ◄────────────── └───────────────┘ ──┘ (token refresh)
//!     ▲      │      SessionEnded
//!     └──────┘ SessionEnded
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Anonymous)

    Anonymous => {
        SessionStarted => Authenticated,
        SessionEnded => Anonymous
    },
    Authenticated => {
        SessionStarted => Authenticated,
        SessionEnded => Anonymous
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Authentication state exposed to views and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticated => "authenticated",
        }
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Anonymous => AuthState::Anonymous,
            AuthMachineState::Authenticated => AuthState::Authenticated,
        }
    }
}

/// Input for a session notification: any session present starts or refreshes
/// the authenticated state, an empty one ends it.
pub fn input_for(session_present: bool) -> AuthMachineInput {
    if session_present {
        AuthMachineInput::SessionStarted
    } else {
        AuthMachineInput::SessionEnded
    }
}
