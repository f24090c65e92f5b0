//! CLI Exit Codes
//!
//! Test harnesses only look at zero versus non-zero, so every failure kind
//! maps onto the same code. The kind is still kept for messages and reports.

use crate::core::retry::{ControllerState, Verdict};
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Verified pass (including an accepted benign error)
    pub const SUCCESS: u8 = 0;

    /// Verification failed, endpoint unreachable, cancelled or bad arguments
    pub const FAILURE: u8 = 1;
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad or missing arguments
    InvalidArgs,
    /// Configuration could not be loaded
    Config,
    /// Endpoint not reachable
    ConnectionFailed,
    /// Retry budget exhausted or expected token missing
    VerificationFailed,
    /// Interrupted by a signal
    Cancelled,
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Failure with kind and message
    Failure(FailureKind, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a note
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure of `kind`
    pub fn failure(kind: FailureKind, msg: impl Into<String>) -> Self {
        Self::Failure(kind, msg.into())
    }

    /// Endpoint not reachable
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::Failure(FailureKind::ConnectionFailed, msg.into())
    }

    /// Map a controller verdict
    pub fn from_verdict(verdict: &Verdict) -> Self {
        match verdict.state {
            ControllerState::Passed if verdict.benign => Self::success_with_message(
                "NOTE: command returned \"Already\", accepted as XFAIL",
            ),
            ControllerState::Passed => Self::success(),
            ControllerState::ShutdownRequested => {
                Self::failure(FailureKind::Cancelled, "interrupted before a verdict was reached")
            }
            ControllerState::Failed | ControllerState::AwaitingResult => Self::failure(
                FailureKind::VerificationFailed,
                format!(
                    "no passing answer after {} cycles ({} parse errors, {} errors)",
                    verdict.cycles, verdict.parse_errors, verdict.generic_errors
                ),
            ),
        }
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Failure(..) => ExitCodes::FAILURE,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Failure(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Exit code for an argument-parsing outcome; help and version requests are
/// not failures
pub fn usage_exit_code(kind: clap::error::ErrorKind) -> u8 {
    match kind {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            ExitCodes::SUCCESS
        }
        _ => ExitCodes::FAILURE,
    }
}
