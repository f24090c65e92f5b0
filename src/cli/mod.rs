//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Run reports in text or JSON

pub mod exit_codes;
pub mod report;

pub use exit_codes::{usage_exit_code, CliResult, ExitCodes, FailureKind};
pub use report::{render_checks, OutputFormat, Report};
