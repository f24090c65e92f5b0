//! # cliprobe Core Library
//!
//! Command/response verification for the command-line interface of an
//! embedded networking stack. A command is sent over a serial link or typed
//! into a tmux pane, the reply is classified, and the command is retried under
//! two bounded budgets until it passes or the budgets run out.
//!
//! ## Features
//!
//! - Serial ports (USB-Serial adapters, 115200 8N1 by default)
//! - tmux panes running a host-side CLI process
//! - Error-marker classification with parse-error and missing-reply backoff
//! - Cooperative cancellation through a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - Pre-flight device and host probes
//! - CLI with exit codes and JSON reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use cliprobe_core::{RetryPolicy, Session, TmuxConfig, Transport};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Transport::Tmux(TmuxConfig::new("server-device"));
//!     let mut session = Session::new(transport, RetryPolicy::default(), CancellationToken::new());
//!
//!     let verdict = session.verify("state", "leader", None).await?;
//!     println!("passed: {}", verdict.passed());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat, Report};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::classifier::{classify, Outcome};
pub use crate::core::retry::{ControllerState, RetryController, RetryPolicy, Verdict};
pub use crate::core::session::{OutputProbe, Session};
pub use crate::core::transport::{
    SerialConfig, TmuxConfig, Transport, TransportError, TransportTrait, TransportType,
};
pub use crate::core::window::OutputWindow;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
