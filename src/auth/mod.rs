//! Authentication module.
//!
//! Handles the session state machine, HMAC request signatures, timestamp
//! freshness and the path whitelist.

mod authenticator;
pub mod clock;
mod session;
pub mod signature;
mod whitelist;

pub use authenticator::{HeadVerdict, RequestAuthenticator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{SessionSnapshot, SessionStore};
pub use whitelist::{
    PathWhitelist, Route, DEFAULT_COMMAND_ROUTES, HANDSHAKE_PATH, HEALTH_PATH, METRICS_PATH,
};
