//! Core module containing the verification engine
//!
//! This module provides:
//! - Transport layer for reaching a device CLI (serial, tmux)
//! - Output window tracking over accumulated captures
//! - Response classification
//! - Retry controller with budgets and growing backoff
//! - Sessions tying one transport to one command
//! - Pre-flight environment checks

pub mod classifier;
pub mod preflight;
pub mod retry;
pub mod session;
pub mod transport;
pub mod window;
