//! Route guarding.

use crate::User;
use parking_lot::Mutex;
use std::fmt;

/// Pages of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Todos,
    Feed,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Todos => "/todos",
            Route::Feed => "/feed",
        }
    }

    /// Routes that need a signed-in user.
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Todos | Route::Feed)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of guarding a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    Redirect { to: Route, permanent: bool },
}

/// Decide whether `route` renders for the given identity.
///
/// Protected routes send anonymous visitors to the landing page; the landing
/// page sends signed-in users straight to their todos.
pub fn guard(route: Route, user: Option<&User>) -> RouteDecision {
    match (route, user) {
        (route, None) if route.is_protected() => RouteDecision::Redirect {
            to: Route::Landing,
            permanent: false,
        },
        (Route::Landing, Some(_)) => RouteDecision::Redirect {
            to: Route::Todos,
            permanent: true,
        },
        _ => RouteDecision::Render,
    }
}

/// Performs navigation side effects.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Remembers every navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Route> {
        self.visited.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.visited.lock().push(route);
    }
}
