//! Audit entry types.
//!
//! Defines the structure of audit log entries.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Where in the command's life an entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStage {
    /// Validation at the network boundary.
    Request,
    /// Execution on the host thread.
    Dispatch,
}

/// A single audit log entry.
///
/// Never contains tokens or signatures: `params` is the sanitized body.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp when the entry was written.
    pub timestamp: String,
    pub request_id: Uuid,
    pub stage: AuditStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    /// Session generation the request was checked against.
    pub generation: u64,
    /// Sanitized body (sensitive values redacted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub result: AuditResult,
    /// Time spent in milliseconds.
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Entry for a validation outcome.
    pub fn request(
        request_id: Uuid,
        method: impl Into<String>,
        path: impl Into<String>,
        result: AuditResult,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            stage: AuditStage::Request,
            method: Some(method.into()),
            path: path.into(),
            remote_addr: None,
            generation: 0,
            params: None,
            result,
            duration_ms: 0,
        }
    }

    /// Entry for a dispatch outcome.
    pub fn dispatch(
        request_id: Uuid,
        path: impl Into<String>,
        generation: u64,
        result: AuditResult,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            stage: AuditStage::Dispatch,
            method: None,
            path: path.into(),
            remote_addr: None,
            generation,
            params: None,
            result,
            duration_ms: 0,
        }
    }

    pub fn with_remote_addr(mut self, remote_addr: Option<String>) -> Self {
        self.remote_addr = remote_addr;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_params(mut self, params: Option<serde_json::Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Outcome recorded in an audit entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum AuditResult {
    /// Request passed validation and was answered.
    #[serde(rename = "accepted")]
    Accepted { status_code: u16 },
    /// Request failed validation.
    #[serde(rename = "rejected")]
    Rejected {
        error_code: String,
        error_message: String,
    },
    /// Handler applied the command.
    #[serde(rename = "dispatched")]
    Dispatched,
    /// Handler returned an error or panicked.
    #[serde(rename = "failed")]
    Failed {
        error_code: String,
        error_message: String,
    },
    /// No handler for the path.
    #[serde(rename = "dropped")]
    Dropped,
}
