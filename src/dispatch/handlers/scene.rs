//! Transform, material, mesh, selection and camera updates.

use serde_json::Value;
use tracing::debug;

use crate::dispatch::handler::CommandHandler;
use crate::dispatch::host::HostState;
use crate::error::BridgeError;
use crate::queue::QueuedCommand;

use super::{payload_object, rejected, required_id};

/// Records the latest payload of one scene component.
pub struct SceneUpdateHandler {
    path: &'static str,
    component: &'static str,
    /// Whether the payload names a target object via `id`.
    keyed: bool,
}

impl SceneUpdateHandler {
    /// Updates addressed to one object by `id`. Locked objects are refused.
    pub fn keyed(path: &'static str, component: &'static str) -> Self {
        Self {
            path,
            component,
            keyed: true,
        }
    }

    /// Updates of scene-wide state, such as the camera.
    pub fn singleton(path: &'static str, component: &'static str) -> Self {
        Self {
            path,
            component,
            keyed: false,
        }
    }
}

impl CommandHandler for SceneUpdateHandler {
    fn path(&self) -> &'static str {
        self.path
    }

    fn handle(&self, host: &mut HostState, command: &QueuedCommand) -> Result<(), BridgeError> {
        if host.is_paused() {
            return Err(rejected(command, "host is paused"));
        }

        let payload = payload_object(command)?;
        let target = if self.keyed {
            let id = required_id(command, &payload)?;
            if host.is_locked(id) {
                return Err(rejected(command, format!("object '{}' is locked", id)));
            }
            id.to_string()
        } else {
            self.component.to_string()
        };

        debug!(
            request_id = %command.request_id,
            component = self.component,
            target = %target,
            "Applying scene update"
        );
        host.apply(self.component, &target, Value::Object(payload));
        Ok(())
    }
}
