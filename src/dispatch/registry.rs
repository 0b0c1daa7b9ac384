//! Handler table keyed by command path.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::auth::{PathWhitelist, Route};
use crate::error::{BridgeError, HandlerErrorKind};

use super::handler::CommandHandler;
use super::handlers::host_stubs;

/// Registry of main-thread handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in host stubs.
    pub fn with_host_stubs() -> Self {
        let mut registry = Self::new();
        for handler in host_stubs() {
            let path = handler.path();
            if let Err(e) = registry.register(handler) {
                warn!(path = path, error = %e, "Skipping built-in handler");
            }
        }

        info!(count = registry.len(), "Handler registry initialized");
        registry
    }

    /// Register a handler. A second handler for the same path is an error.
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) -> Result<(), BridgeError> {
        let path = handler.path();
        if self.handlers.contains_key(path) {
            return Err(BridgeError::Handler {
                kind: HandlerErrorKind::DuplicatePath {
                    path: path.to_string(),
                },
            });
        }
        debug!(path = path, "Registering handler");
        self.handlers.insert(path, handler);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&dyn CommandHandler> {
        self.handlers.get(path).map(|h| h.as_ref())
    }

    /// Check the table against the whitelist once, at startup.
    ///
    /// A handler on a path that is not a whitelisted command route is an
    /// error. Whitelisted command paths without a handler are returned (and
    /// logged); their commands will be dropped at dispatch time.
    pub fn validate_against(&self, whitelist: &PathWhitelist) -> Result<Vec<String>, BridgeError> {
        let mut paths = self.paths();
        paths.sort_unstable();
        for path in paths {
            if !matches!(whitelist.route(path), Some(Route::Command(_))) {
                return Err(BridgeError::Handler {
                    kind: HandlerErrorKind::NotWhitelisted {
                        path: path.to_string(),
                    },
                });
            }
        }

        let unhandled: Vec<String> = whitelist
            .command_paths()
            .filter(|path| self.get(path).is_none())
            .map(str::to_string)
            .collect();

        for path in &unhandled {
            warn!(path = %path, "Whitelisted command path has no handler");
        }
        Ok(unhandled)
    }

    /// Registered paths.
    pub fn paths(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
