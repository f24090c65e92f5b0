//! Run reports
//!
//! What the binary prints once a run is over: the classic one-line
//! `CLI Test Done: PASS|FAIL` for humans and scripts grepping logs, or a JSON
//! document for tooling.

use super::exit_codes::CliResult;
use crate::core::preflight::CheckResult;
use crate::core::retry::Verdict;
use crate::core::transport::TransportType;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Instant;

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format for scripting
    Json,
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Transport variant
    pub variant: TransportType,
    /// Device path or session name
    pub endpoint: String,
    /// Command sent, absent for output probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Expected token
    pub expected: String,
    /// Overall result
    pub passed: bool,
    /// Controller result, absent when no command loop ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Success note or failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Start time
    pub started_at: DateTime<Local>,
    /// Wall-clock duration
    pub elapsed_ms: u64,
    #[serde(skip)]
    started: Instant,
}

impl Report {
    /// Start a report; call [`Report::finish`] when the run is over
    pub fn start(
        variant: TransportType,
        endpoint: &str,
        command: Option<&str>,
        expected: &str,
    ) -> Self {
        Self {
            variant,
            endpoint: endpoint.to_string(),
            command: command.map(String::from),
            expected: expected.to_string(),
            passed: false,
            verdict: None,
            message: None,
            started_at: Local::now(),
            elapsed_ms: 0,
            started: Instant::now(),
        }
    }

    /// Record the result
    pub fn finish(&mut self, result: &CliResult, verdict: Option<Verdict>) {
        self.passed = result.is_success();
        self.message = result.message().map(String::from);
        self.verdict = verdict;
        self.elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
    }

    /// Render in `format`
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Text => {
                let status = if self.passed { "PASS" } else { "FAIL" };
                match self.message.as_deref() {
                    Some(note) if self.passed => format!("{note}\nCLI Test Done: {status}"),
                    _ => format!("CLI Test Done: {status}"),
                }
            }
        }
    }
}

/// Render pre-flight results in `format`
pub fn render_checks(results: &[CheckResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(results).unwrap_or_default(),
        OutputFormat::Text => results
            .iter()
            .map(|r| {
                if r.ok {
                    format!("> {}: accessible", r.label)
                } else {
                    format!(
                        "> {}: NOT accessible ({})",
                        r.label,
                        r.detail.as_deref().unwrap_or("unknown")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::exit_codes::FailureKind;
    use crate::core::classifier::Outcome;
    use crate::core::retry::ControllerState;

    #[test]
    fn test_text_pass_and_fail() {
        let mut report =
            Report::start(TransportType::Tmux, "server-device", Some("state"), "leader");
        report.finish(&CliResult::success(), None);
        assert_eq!(report.render(OutputFormat::Text), "CLI Test Done: PASS");

        report.finish(
            &CliResult::failure(FailureKind::VerificationFailed, "budget exhausted"),
            None,
        );
        assert_eq!(report.render(OutputFormat::Text), "CLI Test Done: FAIL");
    }

    #[test]
    fn test_text_benign_note() {
        let mut report = Report::start(
            TransportType::Serial,
            "/dev/ttyCliServer",
            Some("thread start"),
            "Done",
        );
        report.finish(&CliResult::success_with_message("NOTE: accepted as XFAIL"), None);
        assert_eq!(
            report.render(OutputFormat::Text),
            "NOTE: accepted as XFAIL\nCLI Test Done: PASS"
        );
    }

    #[test]
    fn test_json_shape() {
        let verdict = Verdict {
            state: ControllerState::Passed,
            last_outcome: Some(Outcome::Pass),
            benign: false,
            parse_errors: 1,
            generic_errors: 0,
            cycles: 2,
        };
        let mut report =
            Report::start(TransportType::Tmux, "server-device", Some("ifconfig up"), "Done");
        report.finish(&CliResult::success(), Some(verdict));

        let rendered = report.render(OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(json["variant"], "tmux");
        assert_eq!(json["passed"], true);
        assert_eq!(json["verdict"]["state"], "passed");
        assert_eq!(json["verdict"]["last_outcome"], "pass");
        assert_eq!(json["verdict"]["parse_errors"], 1);
        assert!(json.get("message").is_none());
        assert!(json.get("started_at").is_some());
    }

    #[test]
    fn test_render_checks_text() {
        let results = vec![
            CheckResult { label: "device /dev/ttyCliServer".into(), ok: true, detail: None },
            CheckResult {
                label: "host fdde::1".into(),
                ok: false,
                detail: Some("no reply".into()),
            },
        ];
        assert_eq!(
            render_checks(&results, OutputFormat::Text),
            "> device /dev/ttyCliServer: accessible\n> host fdde::1: NOT accessible (no reply)"
        );
    }
}
