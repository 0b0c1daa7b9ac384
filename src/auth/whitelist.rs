//! Path whitelist and route table.
//!
//! Built once at startup from the built-in routes plus
//! `whitelist.additional_paths`, then shared read-only.

use std::collections::BTreeMap;

use axum::http::Method;

use crate::config::WhitelistConfig;
use crate::error::{BridgeError, RequestErrorKind};
use crate::protocol::Acknowledgement;

pub const HEALTH_PATH: &str = "/health";
pub const HANDSHAKE_PATH: &str = "/handshake";
pub const METRICS_PATH: &str = "/metrics";

/// Built-in command routes and how each acknowledges an accepted request.
pub const DEFAULT_COMMAND_ROUTES: &[(&str, Acknowledgement)] = &[
    ("/object/lock", Acknowledgement::Ok),
    ("/panic", Acknowledgement::Ok),
    ("/transform/set", Acknowledgement::Queued),
    ("/material/update", Acknowledgement::Ok),
    ("/object/mutate", Acknowledgement::Queued),
    ("/selection/set", Acknowledgement::Ok),
    ("/camera/set", Acknowledgement::Ok),
];

/// What a whitelisted path does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Public liveness check.
    Health,
    /// Session rotation.
    Handshake,
    /// Bridge counters.
    Metrics,
    /// Mutation handed to the host thread.
    Command(Acknowledgement),
}

impl Route {
    pub fn is_handshake(self) -> bool {
        self == Route::Handshake
    }

    fn allows(self, method: &Method) -> bool {
        match self {
            Route::Health => method == Method::GET,
            Route::Metrics => method == Method::GET || method == Method::POST,
            Route::Handshake | Route::Command(_) => method == Method::POST,
        }
    }
}

/// Immutable set of allowed paths.
#[derive(Debug, Clone)]
pub struct PathWhitelist {
    routes: BTreeMap<String, Route>,
}

impl PathWhitelist {
    /// The built-in routes only.
    pub fn with_defaults() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(HEALTH_PATH.to_string(), Route::Health);
        routes.insert(HANDSHAKE_PATH.to_string(), Route::Handshake);
        routes.insert(METRICS_PATH.to_string(), Route::Metrics);
        for (path, ack) in DEFAULT_COMMAND_ROUTES {
            routes.insert(path.to_string(), Route::Command(*ack));
        }
        Self { routes }
    }

    /// Built-in routes extended with configured command paths.
    ///
    /// A configured path never overrides a built-in route.
    pub fn from_config(config: &WhitelistConfig) -> Self {
        let mut whitelist = Self::with_defaults();
        for path in &config.additional_paths {
            whitelist
                .routes
                .entry(path.clone())
                .or_insert(Route::Command(Acknowledgement::Queued));
        }
        whitelist
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn route(&self, path: &str) -> Option<Route> {
        self.routes.get(path).copied()
    }

    /// Whitelist gate plus method routing.
    ///
    /// Unknown paths are forbidden for every verb. A whitelisted path with no
    /// route for the verb is `404` for `GET` and `405` otherwise.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Route, BridgeError> {
        let route = self.route(path).ok_or_else(|| BridgeError::Request {
            kind: RequestErrorKind::ForbiddenPath {
                path: path.to_string(),
            },
        })?;

        if route.allows(method) {
            return Ok(route);
        }

        let kind = if method == Method::GET {
            RequestErrorKind::NotFound {
                path: path.to_string(),
            }
        } else {
            RequestErrorKind::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            }
        };
        Err(BridgeError::Request { kind })
    }

    /// Paths routed to the host thread.
    pub fn command_paths(&self) -> impl Iterator<Item = &str> {
        self.routes
            .iter()
            .filter(|(_, route)| matches!(route, Route::Command(_)))
            .map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for PathWhitelist {
    fn default() -> Self {
        Self::with_defaults()
    }
}
