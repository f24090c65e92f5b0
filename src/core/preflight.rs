//! Pre-flight checks
//!
//! Quick environment probes run before a test suite: are the device nodes
//! plugged in, are the hosts the suite depends on reachable, and has no border
//! router left an error flag behind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;

/// ssh reports its own failures (unreachable host, auth) with this status
const SSH_FAILURE_STATUS: i32 = 255;

/// An error-flag file, on this machine or on a host reached over ssh.
///
/// Written as `PATH`, `HOST:PATH` or `[IPV6]:PATH`; `HOST` may carry a user
/// (`allrounder@router`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagLocation {
    /// Flag file path
    pub path: PathBuf,
    /// ssh destination; local when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl FromStr for FlagLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, path) = if let Some(rest) = s.strip_prefix('[') {
            let (host, path) = rest
                .split_once("]:")
                .ok_or_else(|| format!("expected [HOST]:PATH, got {s:?}"))?;
            (Some(host), path)
        } else {
            match s.split_once(':') {
                Some((host, path)) if !host.is_empty() && !host.contains('/') => (Some(host), path),
                _ => (None, s),
            }
        };

        if path.is_empty() {
            return Err(format!("missing flag path in {s:?}"));
        }
        Ok(Self {
            path: PathBuf::from(path),
            host: host.map(String::from),
        })
    }
}

impl fmt::Display for FlagLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host.as_deref() {
            Some(host) if host.contains(':') => write!(f, "[{host}]:{}", self.path.display()),
            Some(host) => write!(f, "{host}:{}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// One pre-flight probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Device node exists (e.g. `/dev/ttyCliServer`)
    Device(PathBuf),
    /// Host answers one ping
    Host(String),
    /// Error-flag file does not exist
    FlagAbsent(FlagLocation),
}

impl Check {
    /// Human-readable label
    pub fn label(&self) -> String {
        match self {
            Self::Device(path) => format!("device {}", path.display()),
            Self::Host(host) => format!("host {host}"),
            Self::FlagAbsent(flag) => format!("error flag {flag}"),
        }
    }
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// What was checked
    pub label: String,
    /// Probe succeeded
    pub ok: bool,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn new(label: String, detail: Option<String>) -> Self {
        Self {
            label,
            ok: detail.is_none(),
            detail,
        }
    }
}

/// Device node exists
pub fn check_device(path: &Path) -> CheckResult {
    let label = Check::Device(path.to_path_buf()).label();
    CheckResult::new(label, std::fs::metadata(path).err().map(|e| e.to_string()))
}

/// `ping` arguments for one echo request to `host`
fn ping_args(host: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(4);
    if matches!(host.parse::<IpAddr>(), Ok(IpAddr::V6(_))) {
        args.push("-6".to_string());
    }
    args.extend(["-c".to_string(), "1".to_string(), host.to_string()]);
    args
}

/// Host answers one ping within `timeout`
pub async fn check_host(host: &str, timeout: Duration) -> CheckResult {
    let label = Check::Host(host.to_string()).label();
    let run = Command::new("ping")
        .args(ping_args(host))
        .kill_on_drop(true)
        .output();

    let detail = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) if output.status.success() => None,
        Ok(Ok(output)) => Some(format!("ping exited with {}", output.status)),
        Ok(Err(e)) => Some(format!("cannot run ping: {e}")),
        Err(_) => Some(format!("no reply within {timeout:?}")),
    };

    CheckResult::new(label, detail)
}

/// `ssh` arguments that list `path` on `host` without prompting
fn ssh_args(host: &str, path: &Path) -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        host.to_string(),
        "ls".to_string(),
        path.display().to_string(),
    ]
}

/// Error flag is absent; remote flags are listed over ssh within `timeout`
pub async fn check_flag_absent(flag: &FlagLocation, timeout: Duration) -> CheckResult {
    let label = Check::FlagAbsent(flag.clone()).label();

    let Some(host) = flag.host.as_deref() else {
        let detail = std::fs::metadata(&flag.path)
            .is_ok()
            .then(|| "error flag present".to_string());
        return CheckResult::new(label, detail);
    };

    let run = Command::new("ssh")
        .args(ssh_args(host, &flag.path))
        .kill_on_drop(true)
        .output();

    let detail = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) if output.status.success() => Some(format!("error flag present on {host}")),
        Ok(Ok(output)) if output.status.code() == Some(SSH_FAILURE_STATUS) => Some(format!(
            "cannot reach {host}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(format!("cannot run ssh: {e}")),
        Err(_) => Some(format!("no answer from {host} within {timeout:?}")),
    };

    CheckResult::new(label, detail)
}

/// Run `checks` in order, stopping at the first failure
pub async fn run_checks(checks: &[Check], timeout: Duration) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        let result = match check {
            Check::Device(path) => check_device(path),
            Check::Host(host) => check_host(host, timeout).await,
            Check::FlagAbsent(flag) => check_flag_absent(flag, timeout).await,
        };
        if result.ok {
            tracing::info!("{}: accessible", result.label);
        } else {
            tracing::warn!(
                "{}: NOT accessible ({})",
                result.label,
                result.detail.as_deref().unwrap_or("unknown")
            );
        }
        let failed = !result.ok;
        results.push(result);
        if failed {
            break;
        }
    }
    results
}
