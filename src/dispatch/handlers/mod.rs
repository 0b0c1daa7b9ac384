//! Built-in host handlers.
//!
//! These record what the orchestrator asked for in
//! [`HostState`](crate::dispatch::HostState) instead of driving a real scene.

mod lock;
mod panic;
mod scene;

use serde_json::{Map, Value};

use crate::error::{BridgeError, HandlerErrorKind};
use crate::queue::QueuedCommand;

use super::handler::CommandHandler;

pub use lock::ObjectLockHandler;
pub use panic::PanicHandler;
pub use scene::SceneUpdateHandler;

/// One handler for each built-in command route.
pub fn host_stubs() -> Vec<Box<dyn CommandHandler>> {
    vec![
        Box::new(SceneUpdateHandler::keyed("/transform/set", "transform")),
        Box::new(SceneUpdateHandler::keyed("/material/update", "material")),
        Box::new(SceneUpdateHandler::keyed("/object/mutate", "mesh")),
        Box::new(SceneUpdateHandler::singleton("/selection/set", "selection")),
        Box::new(SceneUpdateHandler::singleton("/camera/set", "camera")),
        Box::new(ObjectLockHandler),
        Box::new(PanicHandler),
    ]
}

fn invalid_payload(command: &QueuedCommand, message: impl Into<String>) -> BridgeError {
    BridgeError::Handler {
        kind: HandlerErrorKind::InvalidPayload {
            path: command.path.clone(),
            message: message.into(),
        },
    }
}

fn rejected(command: &QueuedCommand, message: impl Into<String>) -> BridgeError {
    BridgeError::Handler {
        kind: HandlerErrorKind::Rejected {
            path: command.path.clone(),
            message: message.into(),
        },
    }
}

/// The command body as a JSON object.
fn payload_object(command: &QueuedCommand) -> Result<Map<String, Value>, BridgeError> {
    match command.json_body() {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(invalid_payload(command, "expected a JSON object")),
        Err(e) => Err(invalid_payload(command, e.to_string())),
    }
}

/// A required, non-empty string field.
fn required_id<'a>(
    command: &QueuedCommand,
    payload: &'a Map<String, Value>,
) -> Result<&'a str, BridgeError> {
    match payload.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(invalid_payload(command, "missing string field 'id'")),
    }
}
