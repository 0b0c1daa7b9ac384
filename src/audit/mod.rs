//! Audit logging module.
//!
//! Records every validation outcome at the network boundary and every
//! dispatch outcome on the host thread as JSON lines.
//!
//! ## Features
//!
//! - Structured JSON entries with request id, path, generation and timing
//! - Body sanitization (credentials redacted, bulky mesh data truncated)
//! - Thread-safe file writing with sync for durability

mod entry;
mod logger;
mod sanitize;

pub use entry::{AuditEntry, AuditResult, AuditStage};
pub use logger::AuditLogger;
pub use sanitize::{sanitize_body, sanitize_params};
