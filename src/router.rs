//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. A path that exists under
//! a different method is reported separately so the server can answer `405`
//! instead of `404`.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::Handler;

type Route = Arc<dyn Handler>;

/// The application router. Build it once at startup and hand it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
}

/// Outcome of a route lookup.
pub(crate) enum Lookup {
    Found(Route),
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a `GET` handler. Returns `self` for chaining.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    /// Register a handler for a method + path pair.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or is already registered for
    /// `method`. Routes are fixed at startup, so this is a programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Arc::new(handler) as Route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            return Lookup::Found(Arc::clone(matched.value));
        }

        let elsewhere = self
            .routes
            .iter()
            .any(|(other, tree)| other != method && tree.at(path).is_ok());
        if elsewhere { Lookup::MethodNotAllowed } else { Lookup::NotFound }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
