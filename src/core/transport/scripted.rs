//! In-memory transport that replays a script
//!
//! Used by tests to drive the verification engine without hardware. Every
//! call is recorded in a shared log that stays readable after the transport
//! has been moved into a session.

use super::{TransportError, TransportTrait, TransportType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedCall {
    /// `open` was called
    Open,
    /// `send` was called with this text
    Send(String),
    /// `capture` was called
    Capture,
    /// `close` was called
    Close,
}

/// Shared call log
pub type ScriptedLog = Arc<Mutex<Vec<ScriptedCall>>>;

/// Scripted transport
pub struct ScriptedTransport {
    endpoint: String,
    open_error: Option<TransportError>,
    fail_writes: bool,
    sends: VecDeque<Result<(), TransportError>>,
    captures: VecDeque<Result<String, TransportError>>,
    response_delay: Duration,
    is_open: bool,
    log: ScriptedLog,
}

impl ScriptedTransport {
    /// Transport whose sends succeed and whose captures are empty until
    /// scripted otherwise
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            open_error: None,
            fail_writes: false,
            sends: VecDeque::new(),
            captures: VecDeque::new(),
            response_delay: Duration::ZERO,
            is_open: false,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `open` fail with `error`
    #[must_use]
    pub fn fail_open(mut self, error: TransportError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Make every `send` fail
    #[must_use]
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Queue the result of the next unscripted `send`
    #[must_use]
    pub fn then_send(mut self, result: Result<(), TransportError>) -> Self {
        self.sends.push_back(result);
        self
    }

    /// Queue text for the next `capture`
    #[must_use]
    pub fn then_capture(mut self, text: &str) -> Self {
        self.captures.push_back(Ok(text.to_string()));
        self
    }

    /// Queue a read failure for the next `capture`
    #[must_use]
    pub fn then_capture_error(mut self, reason: &str) -> Self {
        self.captures.push_back(Err(TransportError::Read(reason.to_string())));
        self
    }

    /// Set the wait between send and capture
    #[must_use]
    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Handle to the call log
    pub fn log(&self) -> ScriptedLog {
        Arc::clone(&self.log)
    }

    fn record(&self, call: ScriptedCall) {
        self.log.lock().push(call);
    }
}

#[async_trait]
impl TransportTrait for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.record(ScriptedCall::Open);
        if let Some(err) = self.open_error.take() {
            return Err(err);
        }
        self.is_open = true;
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.record(ScriptedCall::Send(text.to_string()));
        if !self.is_open {
            return Err(TransportError::NotConnected);
        }
        if self.fail_writes {
            return Err(TransportError::Write("scripted write failure".to_string()));
        }
        self.sends.pop_front().unwrap_or(Ok(()))
    }

    async fn capture(&mut self) -> Result<String, TransportError> {
        self.record(ScriptedCall::Capture);
        if !self.is_open {
            return Err(TransportError::NotConnected);
        }
        self.captures.pop_front().unwrap_or_else(|| Ok(String::new()))
    }

    async fn close(&mut self) {
        self.record(ScriptedCall::Close);
        self.is_open = false;
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn response_delay(&self) -> Duration {
        self.response_delay
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Scripted
    }
}
