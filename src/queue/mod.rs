//! Hand-off queue between the network boundary and the host thread.

mod channel;
mod command;

pub use channel::{command_queue, CommandReceiver, CommandSender};
pub use command::QueuedCommand;
