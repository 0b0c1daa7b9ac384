//! Session token and generation counter.
//!
//! The bridge has exactly one session. Its token and generation are only
//! ever read or written together under one mutex, so a reader never sees a
//! token from one handshake paired with the generation of another.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use super::signature::constant_time_eq;

/// A consistent copy of the session state.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Token a request must present: the session token, or the bootstrap
    /// credential while unprovisioned.
    pub token: String,
    pub generation: u64,
    /// Whether a handshake has installed a session token.
    pub provisioned: bool,
}

impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("token", &"[REDACTED]")
            .field("generation", &self.generation)
            .field("provisioned", &self.provisioned)
            .finish()
    }
}

#[derive(Default)]
struct Session {
    /// Empty until the first handshake that supplies a token.
    token: String,
    generation: u64,
}

/// Owner of the bridge session.
pub struct SessionStore {
    state: Mutex<Session>,
    bootstrap_token: String,
}

impl SessionStore {
    /// Create an unprovisioned store at generation 0.
    pub fn new(bootstrap_token: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(Session::default()),
            bootstrap_token: bootstrap_token.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // The critical sections never panic half-way through an update, so a
        // poisoned guard still holds a consistent pair.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot_of(&self, session: &Session) -> SessionSnapshot {
        let provisioned = !session.token.is_empty();
        SessionSnapshot {
            token: if provisioned {
                session.token.clone()
            } else {
                self.bootstrap_token.clone()
            },
            generation: session.generation,
            provisioned,
        }
    }

    /// The active token, or the bootstrap credential when unprovisioned.
    pub fn current_token(&self) -> String {
        let session = self.lock();
        self.snapshot_of(&session).token
    }

    pub fn current_generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_provisioned(&self) -> bool {
        !self.lock().token.is_empty()
    }

    pub fn bootstrap_token(&self) -> &str {
        &self.bootstrap_token
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.lock();
        self.snapshot_of(&session)
    }

    /// Run `f` while holding the session lock.
    ///
    /// No rotation can happen while `f` runs.
    pub fn with_session<R>(&self, f: impl FnOnce(&SessionSnapshot) -> R) -> R {
        let session = self.lock();
        let snapshot = self.snapshot_of(&session);
        let result = f(&snapshot);
        drop(session);
        result
    }

    /// Install `new_token` (if given and non-empty) and bump the generation.
    ///
    /// Returns the new generation.
    pub fn rotate(&self, new_token: Option<&str>) -> u64 {
        let mut session = self.lock();
        Self::apply_rotation(&mut session, new_token)
    }

    /// Rotate only if `presented` is still the token a request must present.
    ///
    /// The comparison and the rotation happen under one lock, so two
    /// handshakes racing with the same credential rotate once between them.
    ///
    /// # Arguments
    ///
    /// * `presented` - Token the caller authenticated with
    /// * `new_token` - Replacement token; `None` or empty keeps the current one
    ///
    /// # Returns
    ///
    /// The new generation, or `None` when a concurrent rotation retired
    /// `presented` first.
    pub fn rotate_if_current(&self, presented: &str, new_token: Option<&str>) -> Option<u64> {
        let mut session = self.lock();
        let current = self.snapshot_of(&session).token;
        if !constant_time_eq(presented, &current) {
            debug!("Rotation skipped, presented token no longer current");
            return None;
        }
        Some(Self::apply_rotation(&mut session, new_token))
    }

    fn apply_rotation(session: &mut Session, new_token: Option<&str>) -> u64 {
        let rekeyed = match new_token {
            Some(token) if !token.is_empty() => {
                session.token = token.to_string();
                true
            }
            _ => false,
        };
        session.generation += 1;
        info!(
            generation = session.generation,
            rekeyed = rekeyed,
            "Session rotated"
        );
        session.generation
    }
}
