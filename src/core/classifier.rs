//! Response classification
//!
//! Maps the text a device printed since the last command onto one of five
//! outcome categories. Classification is plain substring matching in a fixed
//! priority order; the first rule that matches wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker printed when the device CLI failed to decode a command line.
pub const PARSE_ERROR_MARKER: &str = "Error 6";

/// Marker printed when the requested state already holds.
pub const ALREADY_MARKER: &str = "Error 24: Already";

/// Any other device-reported failure.
pub const ERROR_MARKER: &str = "Error";

/// Outcome of classifying one response window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Expected token found (or no token required and no error seen)
    Pass,
    /// Device rejected the command syntax; resending usually helps
    ParseError,
    /// Device reported that the requested state already holds
    BenignError,
    /// Device reported a real failure
    GenericError,
    /// Nothing recognisable has been captured yet
    NoResponse,
}

impl Outcome {
    /// Outcomes that end the retry loop successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Pass | Self::BenignError)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::ParseError => write!(f, "parse error"),
            Self::BenignError => write!(f, "benign error"),
            Self::GenericError => write!(f, "error"),
            Self::NoResponse => write!(f, "no response"),
        }
    }
}

/// Classify `window` against `expected`.
///
/// An empty `expected` token turns every error-free window into a pass,
/// including an empty one.
pub fn classify(window: &str, expected: &str) -> Outcome {
    if !expected.is_empty() && window.contains(expected) {
        Outcome::Pass
    } else if window.contains(PARSE_ERROR_MARKER) {
        Outcome::ParseError
    } else if window.contains(ALREADY_MARKER) {
        Outcome::BenignError
    } else if window.contains(ERROR_MARKER) {
        Outcome::GenericError
    } else if expected.is_empty() {
        Outcome::Pass
    } else {
        Outcome::NoResponse
    }
}
