//! Wire protocol module.
//!
//! Defines the authentication headers, request and response bodies exchanged
//! with the orchestrator over loopback HTTP.
//!
//! ## Signed requests
//!
//! Every request except `GET /health` carries `X-Vibe-Token`. All routes
//! except the handshake also carry `X-Vibe-Timestamp` and `X-Vibe-Signature`,
//! and may carry `X-Vibe-Generation`.

mod headers;
mod request;
mod response;

pub use headers::{
    parse_generation, parse_timestamp_millis, AuthHeaders, GENERATION_HEADER, SIGNATURE_HEADER,
    TIMESTAMP_HEADER, TOKEN_HEADER,
};
pub use request::{AuthenticatedRequest, Credential, HandshakePayload, RequestHead};
pub use response::{
    AckResponse, Acknowledgement, ErrorDetail, ErrorResponse, HandshakeResponse, HealthResponse,
};
