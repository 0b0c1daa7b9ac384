//! `/panic` handler.

use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::handler::CommandHandler;
use crate::dispatch::host::HostState;
use crate::error::BridgeError;
use crate::queue::QueuedCommand;

use super::{invalid_payload, payload_object};

/// Pauses the host. Scene updates are refused until it resumes.
///
/// `{"reason": ..}` pauses; `{"resume": true}` lifts the pause.
pub struct PanicHandler;

impl CommandHandler for PanicHandler {
    fn path(&self) -> &'static str {
        "/panic"
    }

    fn handle(&self, host: &mut HostState, command: &QueuedCommand) -> Result<(), BridgeError> {
        let payload = payload_object(command)?;

        match payload.get("resume") {
            None | Some(Value::Bool(false)) => {}
            Some(Value::Bool(true)) => {
                host.resume();
                info!(request_id = %command.request_id, "Host resumed");
                return Ok(());
            }
            Some(_) => return Err(invalid_payload(command, "'resume' must be a boolean")),
        }

        let reason = payload
            .get("reason")
            .and_then(|r| r.as_str())
            .unwrap_or("unspecified");

        host.pause();
        warn!(
            request_id = %command.request_id,
            reason = reason,
            "Panic received, host paused"
        );
        Ok(())
    }
}
