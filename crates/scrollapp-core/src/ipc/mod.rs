//! IPC module for daemon-client communication
//!
//! Unix socket based IPC so CLI commands can drive a running engine.

mod client;
mod protocol;
mod server;

pub use client::{is_daemon_running, DaemonClient};
pub use protocol::*;
pub use server::DaemonServer;
