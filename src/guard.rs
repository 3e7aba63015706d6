//! Navigation Guard
//!
//! Evaluated before every navigation. Public routes always pass; everything
//! else requires an authenticated session. An unauthenticated navigation to
//! a protected route clears the in-flight session and redirects to the
//! login route instead of proceeding. This check is binary by design;
//! route-specific permission requirements belong to the UI gate.

use std::sync::Arc;

use crate::session::SessionStore;

/// Where unauthenticated navigation is redirected
pub const LOGIN_ROUTE: &str = "/login";

/// Routes that never require authentication
const PUBLIC_ROUTES: &[&str] = &["/", "/login", "/register"];

/// Outcome of a navigation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Proceed to the requested route
    Allow,
    /// Do not render the requested route; navigate here instead
    Redirect(String),
}

/// Pre-navigation authentication check
pub struct NavigationGuard {
    session: Arc<SessionStore>,
    public_routes: Vec<String>,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            public_routes: PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Replace the public route set
    pub fn with_public_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    /// Decide whether navigation to `path` may proceed
    pub fn check(&self, path: &str) -> RouteDecision {
        if self.public_routes.iter().any(|route| route == path) {
            return RouteDecision::Allow;
        }

        if !self.session.is_authenticated() {
            tracing::info!("Unauthenticated navigation to {}, redirecting", path);
            self.session.logout();
            return RouteDecision::Redirect(LOGIN_ROUTE.to_string());
        }

        RouteDecision::Allow
    }
}
