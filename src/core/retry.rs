//! Retry controller
//!
//! The send → wait → read → classify → decide loop. Two independent budgets
//! bound it: one for parse races and missing replies, one for I/O faults and
//! device-reported errors. No outcome ever resets a budget, so a run ends
//! after at most `max_parse_errors + max_generic_errors` cycles.

use super::classifier::{classify, Outcome};
use super::transport::TransportTrait;
use super::window::OutputWindow;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Commands containing this text poll device state and must be resent while
/// no answer has arrived.
const STATE_QUERY: &str = "state";

/// Budgets and delays for one verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Parse errors and missing replies tolerated
    pub max_parse_errors: u32,
    /// Write/read faults and device errors tolerated
    pub max_generic_errors: u32,
    /// Pause before resending after a parse error
    pub parse_retry_delay: Duration,
    /// First wait after a missing reply
    pub backoff_base: Duration,
    /// Added to the wait for every parse error already counted
    pub backoff_scale: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_parse_errors: 3,
            max_generic_errors: 3,
            parse_retry_delay: Duration::from_secs(1),
            backoff_base: Duration::from_secs(10),
            backoff_scale: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Wait after a missing reply, given the parse errors counted so far
    pub fn backoff_for(&self, parse_errors: u32) -> Duration {
        self.backoff_base
            .saturating_add(self.backoff_scale.saturating_mul(parse_errors))
    }

    /// Same budgets, no waiting
    #[must_use]
    pub fn without_delays(self) -> Self {
        Self {
            parse_retry_delay: Duration::ZERO,
            backoff_base: Duration::ZERO,
            backoff_scale: Duration::ZERO,
            ..self
        }
    }

    /// Upper bound on loop cycles
    pub fn max_cycles(&self) -> u32 {
        self.max_parse_errors.saturating_add(self.max_generic_errors)
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Loop running
    AwaitingResult,
    /// Expected answer (or a benign error) seen
    Passed,
    /// A budget ran out
    Failed,
    /// Cancelled from outside
    ShutdownRequested,
}

impl ControllerState {
    /// Check if state is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::AwaitingResult)
    }
}

/// Final result of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Terminal state
    pub state: ControllerState,
    /// Classification of the last window, if any was read
    pub last_outcome: Option<Outcome>,
    /// Passed only because the device answered "Already"
    pub benign: bool,
    /// Parse budget consumed
    pub parse_errors: u32,
    /// Generic budget consumed
    pub generic_errors: u32,
    /// Loop cycles executed
    pub cycles: u32,
}

impl Verdict {
    /// Did the run pass?
    pub fn passed(&self) -> bool {
        self.state == ControllerState::Passed
    }
}

/// Callback invoked with every computed window
pub type WindowObserver = Box<dyn FnMut(&str) + Send>;

/// Retry state machine for one command
pub struct RetryController {
    command: String,
    expected: String,
    policy: RetryPolicy,
    cancel: CancellationToken,
    window: OutputWindow,
    state: ControllerState,
    should_resend: bool,
    has_error: bool,
    parse_errors: u32,
    generic_errors: u32,
    cycles: u32,
    benign: bool,
    last_outcome: Option<Outcome>,
    on_window: Option<WindowObserver>,
}

impl RetryController {
    /// Create a controller for `command`; an empty `expected` accepts any
    /// error-free reply
    pub fn new(
        command: &str,
        expected: &str,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            command: command.to_string(),
            expected: expected.to_string(),
            policy,
            cancel,
            window: OutputWindow::new(),
            state: ControllerState::AwaitingResult,
            should_resend: true,
            has_error: true,
            parse_errors: 0,
            generic_errors: 0,
            cycles: 0,
            benign: false,
            last_outcome: None,
            on_window: None,
        }
    }

    /// Set window callback
    pub fn on_window<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_window = Some(Box::new(callback));
    }

    /// Get current state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Accumulated output
    pub fn window(&self) -> &OutputWindow {
        &self.window
    }

    /// Get retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive `transport` until a terminal state is reached.
    ///
    /// The transport must already be open; closing it is the caller's job.
    pub async fn run(&mut self, transport: &mut dyn TransportTrait) -> Verdict {
        while !self.state.is_terminal() {
            if self.cancel.is_cancelled() {
                tracing::info!("Shutdown requested, stopping after {} cycles", self.cycles);
                self.state = ControllerState::ShutdownRequested;
                break;
            }

            if !self.may_continue() {
                tracing::warn!(
                    "Retry budget exhausted ({}/{} parse, {}/{} generic)",
                    self.parse_errors,
                    self.policy.max_parse_errors,
                    self.generic_errors,
                    self.policy.max_generic_errors
                );
                self.state = ControllerState::Failed;
                break;
            }

            self.cycles += 1;
            self.cycle(transport).await;
        }

        self.verdict()
    }

    /// Snapshot of the current result
    pub fn verdict(&self) -> Verdict {
        Verdict {
            state: self.state,
            last_outcome: self.last_outcome,
            benign: self.benign,
            parse_errors: self.parse_errors,
            generic_errors: self.generic_errors,
            cycles: self.cycles,
        }
    }

    fn may_continue(&self) -> bool {
        self.parse_errors < self.policy.max_parse_errors
            && (self.should_resend || self.has_error)
            && self.generic_errors < self.policy.max_generic_errors
    }

    async fn cycle(&mut self, transport: &mut dyn TransportTrait) {
        if self.should_resend {
            self.window.record_command(&self.command);
            if let Err(e) = transport.send(&self.command).await {
                tracing::warn!(
                    "Cannot write {:?} to {}: {}",
                    self.command,
                    transport.endpoint(),
                    e
                );
                self.io_fault();
                return;
            }
            tracing::debug!("Sent {:?} (cycle {})", self.command, self.cycles);
        }

        pause(&self.cancel, transport.response_delay()).await;

        let captured = match transport.capture().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Cannot read answer from {}: {}", transport.endpoint(), e);
                self.io_fault();
                return;
            }
        };
        self.window.append_capture(&captured);

        let window = self.window.window_since_last_command();
        if let Some(callback) = self.on_window.as_mut() {
            callback(window);
        }
        let outcome = classify(window, &self.expected);
        self.last_outcome = Some(outcome);

        tracing::debug!(
            cycle = self.cycles,
            outcome = %outcome,
            parse_errors = self.parse_errors,
            generic_errors = self.generic_errors,
            "classified response"
        );

        self.apply(outcome).await;
    }

    fn io_fault(&mut self) {
        self.generic_errors += 1;
        self.has_error = true;
        self.should_resend = false;
    }

    async fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => {
                self.should_resend = false;
                self.has_error = false;
                self.state = ControllerState::Passed;
            }
            Outcome::BenignError => {
                self.should_resend = false;
                self.has_error = false;
                self.benign = true;
                tracing::info!("Device returned \"Already\", accepting as expected failure");
                self.state = ControllerState::Passed;
            }
            Outcome::ParseError => {
                self.should_resend = true;
                self.has_error = false;
                self.parse_errors += 1;
                tracing::info!("Parse error, resending");
                pause(&self.cancel, self.policy.parse_retry_delay).await;
            }
            Outcome::GenericError => {
                self.should_resend = false;
                self.has_error = true;
                self.generic_errors += 1;
                tracing::info!("Device reported an error");
            }
            Outcome::NoResponse => {
                self.should_resend = self.command.contains(STATE_QUERY);
                self.has_error = true;
                let delay = self.policy.backoff_for(self.parse_errors);
                self.parse_errors += 1;
                tracing::info!("Response not received, waiting {:?}", delay);
                pause(&self.cancel, delay).await;
            }
        }
    }
}

/// Sleep, but return early once cancellation is requested
async fn pause(cancel: &CancellationToken, delay: Duration) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => {}
        () = cancel.cancelled() => {}
    }
}
