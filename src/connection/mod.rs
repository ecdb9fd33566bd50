//! Device connection layer.
//!
//! Resource modules talk to a device through two narrow operations: reading
//! configuration text with a show command, and sending an ordered batch of
//! configuration commands. Any transport implements the [`Connection`]
//! trait; [`OfflineDevice`] serves a configuration snapshot and records what
//! it is sent, for previews and tests.
//!
//! # Example
//!
//! ```rust
//! use rustible_ios::connection::{Connection, OfflineDevice};
//!
//! # tokio_test_block(async {
//! let device = OfflineDevice::new("r1", "vlan 10\n name ten\n");
//! let text = device.get_config("show running-config").await.unwrap();
//! assert!(text.contains("vlan 10"));
//!
//! device.send_commands(&["vlan 20".to_string()]).await.unwrap();
//! assert_eq!(device.sent(), vec![vec!["vlan 20".to_string()]]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod offline;

use async_trait::async_trait;
use thiserror::Error;

pub use offline::OfflineDevice;

/// Errors that can occur while talking to a device.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish the session.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The device rejected or failed a command.
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// A session with one network device.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Device identifier (hostname or snapshot name)
    fn identifier(&self) -> &str;

    /// Check if the session is still usable
    async fn is_alive(&self) -> bool;

    /// Run a show command and return its text output
    async fn get_config(&self, command: &str) -> ConnectionResult<String>;

    /// Send configuration commands, in order, in one configuration session
    async fn send_commands(&self, commands: &[String]) -> ConnectionResult<()>;

    /// Close the session
    async fn close(&self) -> ConnectionResult<()>;
}
