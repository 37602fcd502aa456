use auth_bridge::{Navigator, Route};
use tracing::info;

/// Prints navigation targets instead of switching pages.
#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        info!(route = %route, "navigating");
        eprintln!("-> {}", route);
    }
}
