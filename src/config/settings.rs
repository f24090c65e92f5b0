//! Application settings

use super::ConfigError;
use crate::core::preflight::FlagLocation;
use crate::core::retry::RetryPolicy;
use crate::core::transport::{SerialConfig, SerialFlowControl, SerialParity, TmuxConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Retry budgets and delays
    pub retry: RetrySettings,
    /// Serial line settings
    pub serial: SerialSettings,
    /// tmux settings
    pub tmux: TmuxSettings,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Pre-flight settings
    pub preflight: PreflightSettings,
}

impl AppConfig {
    /// Load config from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match super::config_file() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be positive".into()));
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(ConfigError::Invalid("serial.data_bits must be 5-8".into()));
        }
        if !(1..=2).contains(&self.serial.stop_bits) {
            return Err(ConfigError::Invalid("serial.stop_bits must be 1 or 2".into()));
        }
        if self.tmux.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("tmux.binary must not be empty".into()));
        }
        Ok(())
    }
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Parse errors and missing replies tolerated
    pub max_parse_errors: u32,
    /// Write/read faults and device errors tolerated
    pub max_generic_errors: u32,
    /// Pause before resending after a parse error (ms)
    pub parse_retry_delay_ms: u64,
    /// First wait after a missing reply (ms)
    pub backoff_base_ms: u64,
    /// Added per parse error already counted (ms)
    pub backoff_scale_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_parse_errors: policy.max_parse_errors,
            max_generic_errors: policy.max_generic_errors,
            parse_retry_delay_ms: millis(policy.parse_retry_delay),
            backoff_base_ms: millis(policy.backoff_base),
            backoff_scale_ms: millis(policy.backoff_scale),
        }
    }
}

impl RetrySettings {
    /// Build the engine's retry policy
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_parse_errors: self.max_parse_errors,
            max_generic_errors: self.max_generic_errors,
            parse_retry_delay: Duration::from_millis(self.parse_retry_delay_ms),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_scale: Duration::from_millis(self.backoff_scale_ms),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Line ending type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Carriage Return only
    Cr,
    /// Line Feed only
    Lf,
    /// Both CR and LF
    #[default]
    CrLf,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

/// Read timeout applied to commands containing any of `keywords`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowCommand {
    /// Substrings that select this rule
    pub keywords: Vec<String>,
    /// Read timeout (ms)
    pub read_timeout_ms: u64,
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Flow control
    pub flow_control: SerialFlowControl,
    /// Command terminator
    pub line_ending: LineEnding,
    /// Read timeout for ordinary commands (ms)
    pub read_timeout_ms: u64,
    /// Longer timeouts for commands that take a while to answer; first match wins
    pub slow_commands: Vec<SlowCommand>,
    /// Wait between send and read (ms)
    pub response_delay_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: SerialFlowControl::None,
            line_ending: LineEnding::CrLf,
            read_timeout_ms: 1000,
            slow_commands: vec![
                SlowCommand {
                    keywords: vec!["connect".into(), "joiner".into(), "commissioner".into()],
                    read_timeout_ms: 5000,
                },
                SlowCommand {
                    keywords: vec!["get".into(), "put".into(), "post".into()],
                    read_timeout_ms: 4000,
                },
            ],
            response_delay_ms: 0,
        }
    }
}

impl SerialSettings {
    /// Read timeout for `command`
    pub fn read_timeout_for(&self, command: &str) -> Duration {
        let ms = self
            .slow_commands
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| command.contains(k.as_str())))
            .map_or(self.read_timeout_ms, |rule| rule.read_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Transport configuration for `port`, tuned for `command`
    pub fn transport_config(&self, port: &str, command: &str) -> SerialConfig {
        let mut config = SerialConfig::new(port, self.baud_rate)
            .parity(self.parity)
            .flow_control(self.flow_control)
            .line_ending(self.line_ending)
            .read_timeout(self.read_timeout_for(command));
        config.data_bits = self.data_bits;
        config.stop_bits = self.stop_bits;
        config.response_delay = Duration::from_millis(self.response_delay_ms);
        config
    }
}

/// tmux settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxSettings {
    /// tmux binary
    pub binary: String,
    /// Upper bound for one tmux invocation (ms)
    pub command_timeout_ms: u64,
    /// Wait between send and capture (ms)
    pub response_delay_ms: u64,
}

impl Default for TmuxSettings {
    fn default() -> Self {
        Self {
            binary: "tmux".to_string(),
            command_timeout_ms: 5000,
            response_delay_ms: 1000,
        }
    }
}

impl TmuxSettings {
    /// Transport configuration for `session`
    pub fn transport_config(&self, session: &str) -> TmuxConfig {
        let mut config = TmuxConfig::new(session).binary(&self.binary);
        config.command_timeout = Duration::from_millis(self.command_timeout_ms);
        config.response_delay = Duration::from_millis(self.response_delay_ms);
        config
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by RUST_LOG)
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Pre-flight settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightSettings {
    /// Device nodes checked when none are given on the command line
    pub devices: Vec<PathBuf>,
    /// Hosts checked when none are given on the command line
    pub hosts: Vec<String>,
    /// Error flags that must not exist, checked when none are given on the
    /// command line
    pub flags: Vec<FlagLocation>,
    /// Ping and ssh timeout (ms)
    pub host_timeout_ms: u64,
}

impl Default for PreflightSettings {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            hosts: Vec::new(),
            flags: Vec::new(),
            host_timeout_ms: 5000,
        }
    }
}
