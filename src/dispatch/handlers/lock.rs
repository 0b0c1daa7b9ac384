//! `/object/lock` handler.

use serde_json::Value;
use tracing::info;

use crate::dispatch::handler::CommandHandler;
use crate::dispatch::host::HostState;
use crate::error::BridgeError;
use crate::queue::QueuedCommand;

use super::{invalid_payload, payload_object, required_id};

/// Adds or removes an object from the lock set.
///
/// Body: `{"id": "<object>", "locked": true|false}`. `locked` defaults to `true`.
pub struct ObjectLockHandler;

impl CommandHandler for ObjectLockHandler {
    fn path(&self) -> &'static str {
        "/object/lock"
    }

    fn handle(&self, host: &mut HostState, command: &QueuedCommand) -> Result<(), BridgeError> {
        let payload = payload_object(command)?;
        let id = required_id(command, &payload)?;
        let locked = match payload.get("locked") {
            None => true,
            Some(Value::Bool(locked)) => *locked,
            Some(_) => return Err(invalid_payload(command, "'locked' must be a boolean")),
        };

        let changed = host.set_locked(id, locked);
        info!(
            request_id = %command.request_id,
            object = id,
            locked = locked,
            changed = changed,
            "Object lock updated"
        );
        Ok(())
    }
}
