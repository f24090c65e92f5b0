//! Verification sessions
//!
//! A Session owns one transport for the lifetime of one command: it opens the
//! endpoint, hands it to a [`RetryController`], and closes it again on every
//! exit path.

use super::retry::{RetryController, RetryPolicy, Verdict, WindowObserver};
use super::transport::{create_transport, Transport, TransportError, TransportTrait, TransportType};
use tokio_util::sync::CancellationToken;

/// Result of a one-shot output probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputProbe {
    /// Expected token found in the capture
    pub passed: bool,
    /// Everything captured
    pub captured: String,
}

/// One verification run against one endpoint
pub struct Session {
    transport: Box<dyn TransportTrait>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session from transport configuration
    pub fn new(config: Transport, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self::with_transport(create_transport(config), policy, cancel)
    }

    /// Create a session around an existing transport
    pub fn with_transport(
        transport: Box<dyn TransportTrait>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            policy,
            cancel,
        }
    }

    /// Endpoint identifier
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Get transport type
    pub fn transport_type(&self) -> TransportType {
        self.transport.transport_type()
    }

    /// Send `command` and verify the reply contains `expected`.
    ///
    /// Fails only when the endpoint cannot be opened; in that case nothing
    /// was written or read. Every other failure is reported in the verdict.
    pub async fn verify(
        &mut self,
        command: &str,
        expected: &str,
        on_window: Option<WindowObserver>,
    ) -> Result<Verdict, TransportError> {
        self.open().await?;

        let mut controller =
            RetryController::new(command, expected, self.policy.clone(), self.cancel.clone());
        if let Some(callback) = on_window {
            controller.on_window(callback);
        }

        let verdict = controller.run(self.transport.as_mut()).await;
        self.transport.close().await;

        tracing::info!(
            "{} on {}: {:?} after {} cycles",
            command,
            self.transport.endpoint(),
            verdict.state,
            verdict.cycles
        );
        Ok(verdict)
    }

    /// Capture the endpoint's output once and look for `expected`, without
    /// sending anything.
    pub async fn probe_output(&mut self, expected: &str) -> Result<OutputProbe, TransportError> {
        self.open().await?;
        let captured = self.transport.capture().await;
        self.transport.close().await;

        let captured = captured?;
        Ok(OutputProbe {
            passed: captured.contains(expected),
            captured,
        })
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        tracing::debug!(
            "Opening {} endpoint {}",
            self.transport.transport_type(),
            self.transport.endpoint()
        );
        if let Err(e) = self.transport.open().await {
            tracing::error!("Cannot reach {}: {}", self.transport.endpoint(), e);
            self.transport.close().await;
            return Err(e);
        }
        Ok(())
    }
}
