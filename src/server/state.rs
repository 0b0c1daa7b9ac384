//! Shared state of the network side.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::audit::AuditLogger;
use crate::auth::{Clock, PathWhitelist, RequestAuthenticator, SessionStore};
use crate::config::Settings;
use crate::queue::{command_queue, CommandReceiver, CommandSender};

use super::handshake::HandshakeHandler;
use super::metrics::BridgeMetrics;

/// Everything a request handler needs, shared across network tasks.
pub struct BridgeState {
    pub(crate) session: Arc<SessionStore>,
    pub(crate) whitelist: Arc<PathWhitelist>,
    pub(crate) authenticator: RequestAuthenticator,
    pub(crate) handshake: HandshakeHandler,
    pub(crate) queue: CommandSender,
    pub(crate) metrics: Arc<BridgeMetrics>,
    pub(crate) audit_logger: Option<Arc<AuditLogger>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) max_body_bytes: usize,
    pub(crate) request_timeout: Duration,
}

impl BridgeState {
    /// Build the network state and the queue consumer for the host thread.
    pub fn from_settings(settings: &Settings, clock: Arc<dyn Clock>) -> (Arc<Self>, CommandReceiver) {
        let session = Arc::new(SessionStore::new(settings.security.bootstrap_token.clone()));
        let whitelist = Arc::new(PathWhitelist::from_config(&settings.whitelist));
        let authenticator = RequestAuthenticator::new(
            Arc::clone(&session),
            Arc::clone(&whitelist),
            Arc::clone(&clock),
            settings.security.freshness_window_ms,
        );
        let handshake = HandshakeHandler::new(Arc::clone(&session), &settings.host);
        let (queue, receiver) = command_queue(settings.limits.max_queue_depth);
        let audit_logger = AuditLogger::from_config(&settings.audit).map(Arc::new);

        info!(
            paths = whitelist.len(),
            max_queue_depth = settings.limits.max_queue_depth,
            freshness_window_ms = settings.security.freshness_window_ms,
            "Bridge state initialized"
        );

        let state = Self {
            session,
            whitelist,
            authenticator,
            handshake,
            queue,
            metrics: Arc::new(BridgeMetrics::new()),
            audit_logger,
            clock,
            max_body_bytes: settings.limits.max_body_bytes,
            request_timeout: settings.limits.request_timeout(),
        };
        (Arc::new(state), receiver)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn whitelist(&self) -> &Arc<PathWhitelist> {
        &self.whitelist
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    pub fn audit_logger(&self) -> Option<&Arc<AuditLogger>> {
        self.audit_logger.as_ref()
    }

    pub fn queue(&self) -> &CommandSender {
        &self.queue
    }
}
