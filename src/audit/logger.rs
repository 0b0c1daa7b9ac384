//! Audit logger for writing audit entries to file.
//!
//! Writes structured audit entries as JSON lines (one JSON object per line).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::error::BridgeError;

use super::entry::AuditEntry;

/// Logger for audit entries.
///
/// Shared by the network tasks and the host thread.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating the parent directory if needed.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON-lines audit file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory cannot be created
    /// - The file cannot be opened for appending
    pub fn new(path: &Path) -> Result<Self, BridgeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Build the logger described by `config`, or `None` when disabled.
    ///
    /// A log file that cannot be opened disables auditing with a warning
    /// rather than stopping the bridge.
    pub fn from_config(config: &AuditConfig) -> Option<Self> {
        if !config.enabled {
            info!("Audit logging disabled");
            return None;
        }

        match Self::new(&config.log_path) {
            Ok(logger) => {
                info!(path = %config.log_path.display(), "Audit logging enabled");
                Some(logger)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %config.log_path.display(),
                    "Failed to create audit logger, audit logging disabled"
                );
                None
            }
        }
    }

    /// Append one entry as a single JSON line.
    ///
    /// Syncs the file after writing; a failed sync is logged, not returned.
    ///
    /// # Arguments
    ///
    /// * `entry` - The audit entry to log
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), BridgeError> {
        let json = serde_json::to_string(entry)?;

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(
            request_id = %entry.request_id,
            path = %entry.path,
            "Audit entry logged"
        );

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
