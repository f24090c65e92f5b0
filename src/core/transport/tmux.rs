//! tmux pane transport
//!
//! Drives a CLI program running inside a detached tmux session, e.g. one
//! started with `tmux new -d -s server-device ot-cli-mtd 1`. Commands are typed
//! into the session's active pane with `send-keys`; output is read back with
//! `capture-pane`, which always returns the whole visible pane.

use super::{TransportError, TransportTrait, TransportType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// tmux transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmuxConfig {
    /// Session name (`tmux new -s <name>`)
    pub session: String,
    /// tmux binary
    pub binary: String,
    /// Upper bound for one tmux invocation
    pub command_timeout: Duration,
    /// Wait between send and capture
    pub response_delay: Duration,
}

impl TmuxConfig {
    /// Create a configuration with default binary and timings
    pub fn new(session: &str) -> Self {
        Self {
            session: session.to_string(),
            binary: "tmux".to_string(),
            command_timeout: Duration::from_secs(5),
            response_delay: Duration::from_secs(1),
        }
    }

    /// Set tmux binary
    #[must_use]
    pub fn binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }
}

/// tmux pane transport
pub struct TmuxTransport {
    config: TmuxConfig,
    pane_id: Option<String>,
}

impl TmuxTransport {
    /// Create a new tmux transport; the pane is resolved by [`TransportTrait::open`]
    pub fn new(config: TmuxConfig) -> Self {
        Self {
            config,
            pane_id: None,
        }
    }

    /// Resolved pane id (e.g. `%3`) once open
    pub fn pane_id(&self) -> Option<&str> {
        self.pane_id.as_deref()
    }

    async fn tmux(&self, args: &[&str]) -> Result<Output, std::io::Error> {
        let run = Command::new(&self.config.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.config.command_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("tmux {} timed out", args.first().copied().unwrap_or_default()),
            )),
        }
    }

    fn target(&self) -> Result<&str, TransportError> {
        self.pane_id.as_deref().ok_or(TransportError::NotConnected)
    }
}

/// `send-keys` invocations that type `text` literally and press Enter
fn send_keys_commands<'a>(target: &'a str, text: &'a str) -> [Vec<&'a str>; 2] {
    [
        // -l: no key-name lookup; --: text may start with '-'
        vec!["send-keys", "-t", target, "-l", "--", text],
        vec!["send-keys", "-t", target, "Enter"],
    ]
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl TransportTrait for TmuxTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let session = self.config.session.clone();
        // `=` forces an exact session name match
        let exact = format!("={session}");

        let probe = self
            .tmux(&["has-session", "-t", &exact])
            .await
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("cannot run tmux: {e}"))
            })?;
        if !probe.status.success() {
            tracing::debug!(
                session = %session,
                stderr = %stderr_text(&probe),
                "has-session failed"
            );
            return Err(TransportError::SessionNotFound(session));
        }

        let pane = self
            .tmux(&["display-message", "-p", "-t", &exact, "#{pane_id}"])
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let pane_id = String::from_utf8_lossy(&pane.stdout).trim().to_string();
        if !pane.status.success() || pane_id.is_empty() {
            return Err(TransportError::NoActivePane(session));
        }

        tracing::debug!(session = %session, pane = %pane_id, "attached to tmux pane");
        self.pane_id = Some(pane_id);
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let target = self.target()?.to_string();

        for args in send_keys_commands(&target, text) {
            let output = self
                .tmux(&args)
                .await
                .map_err(|e| TransportError::Write(e.to_string()))?;
            if !output.status.success() {
                return Err(TransportError::Write(stderr_text(&output)));
            }
        }
        Ok(())
    }

    async fn capture(&mut self) -> Result<String, TransportError> {
        let target = self.target()?.to_string();

        let output = self
            .tmux(&["capture-pane", "-p", "-t", &target])
            .await
            .map_err(|e| TransportError::Read(e.to_string()))?;
        if !output.status.success() {
            return Err(TransportError::Read(stderr_text(&output)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn close(&mut self) {
        // The session belongs to whoever started it; only forget the pane.
        self.pane_id = None;
    }

    fn is_open(&self) -> bool {
        self.pane_id.is_some()
    }

    fn response_delay(&self) -> Duration {
        self.config.response_delay
    }

    fn endpoint(&self) -> &str {
        &self.config.session
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tmux
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_connection_error() {
        let config = TmuxConfig::new("server-device").binary("/nonexistent/cliprobe-tmux");
        let mut transport = TmuxTransport::new(config);
        let err = transport.open().await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_io_before_open() {
        let mut transport = TmuxTransport::new(TmuxConfig::new("server-device"));
        assert!(matches!(transport.send("state").await, Err(TransportError::NotConnected)));
        assert!(matches!(transport.capture().await, Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_send_keys_literal() {
        let [typed, enter] = send_keys_commands("%3", "-h");
        assert_eq!(typed, vec!["send-keys", "-t", "%3", "-l", "--", "-h"]);
        assert_eq!(enter, vec!["send-keys", "-t", "%3", "Enter"]);
    }

    #[test]
    fn test_defaults() {
        let config = TmuxConfig::new("client-device");
        assert_eq!(config.binary, "tmux");
        assert_eq!(config.response_delay, Duration::from_secs(1));
        let transport = TmuxTransport::new(config);
        assert_eq!(transport.endpoint(), "client-device");
        assert_eq!(transport.transport_type(), TransportType::Tmux);
        assert!(transport.pane_id().is_none());
    }
}
