//! Main-thread command handler trait.

use crate::error::BridgeError;
use crate::queue::QueuedCommand;

use super::host::HostState;

/// Mutation logic for one whitelisted command path.
///
/// Handlers run only on the host thread, one command at a time, so they
/// are not required to be `Send` or `Sync`.
///
/// # Example
///
/// ```ignore
/// pub struct ResetHandler;
///
/// impl CommandHandler for ResetHandler {
///     fn path(&self) -> &'static str {
///         "/scene/reset"
///     }
///
///     fn handle(&self, host: &mut HostState, _command: &QueuedCommand) -> Result<(), BridgeError> {
///         host.resume();
///         Ok(())
///     }
/// }
/// ```
pub trait CommandHandler {
    /// Whitelisted path this handler serves (e.g., "/transform/set").
    fn path(&self) -> &'static str;

    /// Apply the command to the host.
    ///
    /// An error is logged and counted by the dispatcher; it never stops the
    /// dispatch loop.
    fn handle(&self, host: &mut HostState, command: &QueuedCommand) -> Result<(), BridgeError>;
}
