//! Host-thread side of the bridge.
//!
//! The [`Dispatcher`] is polled by the host's own loop. It takes commands
//! off the queue and runs the [`CommandHandler`] registered for each path
//! against the [`HostState`].

mod dispatcher;
mod handler;
pub mod handlers;
mod host;
mod registry;

pub use dispatcher::{Dispatcher, TickReport};
pub use handler::CommandHandler;
pub use host::HostState;
pub use registry::HandlerRegistry;
