//! Configuration module for the vibe bridge.
//!
//! Handles loading and validating bridge configuration from TOML files.

mod settings;

pub use settings::*;
