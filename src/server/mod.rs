//! Network side of the bridge: the loopback HTTP listener and what it shares
//! with its request tasks.

mod connection;
mod handshake;
mod listener;
mod metrics;
mod state;

pub use connection::handle_request;
pub use handshake::{HandshakeHandler, CHALLENGE_PREFIX};
pub use listener::{router, BridgeServer};
pub use metrics::{ActiveRequest, BridgeMetrics, MetricsSnapshot};
pub use state::BridgeState;
