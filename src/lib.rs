//! Vibe Bridge Library
//!
//! A local HTTP control plane that lets an external agent drive a host
//! application whose mutation APIs are confined to its main thread.
//! Requests are authenticated on the network side and handed to the host
//! thread through a bounded command queue.

pub mod audit;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod server;
