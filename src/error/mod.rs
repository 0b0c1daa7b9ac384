//! Error types for the vibe bridge.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
