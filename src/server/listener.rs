//! Loopback HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::LimitsConfig;
use crate::error::BridgeError;

use super::connection::handle_request;
use super::state::BridgeState;

/// Build the bridge router.
///
/// There are no per-path routes: every request lands in [`handle_request`],
/// which resolves the path against the whitelist and enforces
/// `limits.request_timeout_seconds` itself.
pub fn router(state: Arc<BridgeState>, limits: &LimitsConfig) -> Router {
    Router::new()
        .fallback(handle_request)
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(limits.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
}

/// HTTP server bound to a loopback address.
pub struct BridgeServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl BridgeServer {
    /// Bind the listener. Only loopback addresses are accepted.
    pub async fn bind(
        addr: SocketAddr,
        state: Arc<BridgeState>,
        limits: &LimitsConfig,
    ) -> Result<Self, BridgeError> {
        if !addr.ip().is_loopback() {
            return Err(BridgeError::Config {
                message: format!("Refusing to bind non-loopback address {}", addr),
            });
        }

        let listener = TcpListener::bind(addr).await.map_err(|e| BridgeError::Server {
            message: format!("Failed to bind {}: {}", addr, e),
        })?;
        let local_addr = listener.local_addr()?;

        info!(address = %local_addr, "Bridge listener bound");

        Ok(Self {
            listener,
            router: router(state, limits),
            local_addr,
        })
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` is notified, then let in-flight requests finish.
    pub async fn run(self, shutdown: Arc<Notify>) -> Result<(), BridgeError> {
        info!(address = %self.local_addr, "Bridge listener running, waiting for requests...");

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.notified().await;
            info!("Shutdown requested, stopping listener");
        })
        .await
        .map_err(|e| BridgeError::Server {
            message: format!("Listener failed: {}", e),
        })?;

        info!("Bridge listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SystemClock;
    use crate::config::Settings;

    #[tokio::test]
    async fn test_bind_rejects_non_loopback() {
        let settings = Settings::default();
        let (state, _receiver) = BridgeState::from_settings(&settings, Arc::new(SystemClock));
        let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();

        let err = BridgeServer::bind(addr, state, &settings.limits)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Config { .. }));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let settings = Settings::default();
        let (state, _receiver) = BridgeState::from_settings(&settings, Arc::new(SystemClock));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let server = BridgeServer::bind(addr, state, &settings.limits).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.local_addr().ip().is_loopback());
    }
}
