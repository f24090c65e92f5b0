//! Transport layer for reaching a device CLI
//!
//! Supports:
//! - Serial ports (USB-Serial adapters, UART bridges)
//! - tmux panes running a host build of the CLI
//!
//! The verification engine only talks to [`TransportTrait`]; it never knows
//! which concrete transport it drives.

mod serial;
#[cfg(any(test, feature = "test-support"))]
mod scripted;
mod tmux;

#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedCall, ScriptedLog, ScriptedTransport};
pub use serial::{SerialConfig, SerialFlowControl, SerialParity, SerialTransport};
pub use tmux::{TmuxConfig, TmuxTransport};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport configuration
#[derive(Debug, Clone)]
pub enum Transport {
    /// Serial device
    Serial(SerialConfig),
    /// tmux session
    Tmux(TmuxConfig),
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Serial device
    Serial,
    /// tmux pane
    Tmux,
    /// In-memory transport used by tests
    Scripted,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Tmux => write!(f, "tmux"),
            Self::Scripted => write!(f, "Scripted"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Serial device node missing
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No tmux session with that name
    #[error("tmux session not found: {0} (start it with `tmux new -d -s {0} <cli-program>`)")]
    SessionNotFound(String),

    /// Session exists but has no active pane
    #[error("tmux session has no active pane: {0}")]
    NoActivePane(String),

    /// Any other failure to reach the endpoint
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation on a transport that is not open
    #[error("Not connected")]
    NotConnected,

    /// Channel rejected a write
    #[error("Write error: {0}")]
    Write(String),

    /// Capture failed or timed out
    #[error("Read error: {0}")]
    Read(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TransportError {
    /// Endpoint could not be reached at all; retrying is pointless
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::PortNotFound(_)
                | Self::PermissionDenied(_)
                | Self::SessionNotFound(_)
                | Self::NoActivePane(_)
                | Self::ConnectionFailed(_)
        )
    }
}

/// Transport trait for all endpoint kinds
#[async_trait]
pub trait TransportTrait: Send {
    /// Open the endpoint
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Send one command line; the transport appends its own terminator
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Capture output; empty when nothing is available. Never blocks
    /// indefinitely.
    async fn capture(&mut self) -> Result<String, TransportError>;

    /// Close the endpoint. Idempotent.
    async fn close(&mut self);

    /// Check if open
    fn is_open(&self) -> bool;

    /// Fixed wait between sending a command and reading the reply
    fn response_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Endpoint identifier (device path or session name)
    fn endpoint(&self) -> &str;

    /// Get transport type
    fn transport_type(&self) -> TransportType;
}

/// Create a transport instance from configuration
pub fn create_transport(config: Transport) -> Box<dyn TransportTrait> {
    match config {
        Transport::Serial(cfg) => Box::new(SerialTransport::new(cfg)),
        Transport::Tmux(cfg) => Box::new(TmuxTransport::new(cfg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_classes() {
        assert!(TransportError::PortNotFound("/dev/ttyACM0".into()).is_connection_error());
        assert!(TransportError::SessionNotFound("server-device".into()).is_connection_error());
        assert!(TransportError::NoActivePane("server-device".into()).is_connection_error());
        assert!(!TransportError::Write("broken pipe".into()).is_connection_error());
        assert!(!TransportError::Read("timed out".into()).is_connection_error());
        assert!(!TransportError::NotConnected.is_connection_error());
    }

    #[test]
    fn test_session_not_found_hint() {
        let msg = TransportError::SessionNotFound("client".into()).to_string();
        assert!(msg.contains("tmux new -d -s client"));
    }
}
