//! cliprobe - embedded CLI verification
//!
//! Sends one command to a device CLI (serial port or tmux pane), checks the
//! reply for an expected token and exits 0 on a verified pass, 1 otherwise.

use clap::{Args, Parser, Subcommand};
use cliprobe_core::cli::{
    render_checks, usage_exit_code, CliResult, ExitCodes, FailureKind, OutputFormat, Report,
};
use cliprobe_core::config::{AppConfig, LoggingConfig};
use cliprobe_core::core::preflight::{run_checks, Check, FlagLocation};
use cliprobe_core::core::retry::{RetryPolicy, WindowObserver};
use cliprobe_core::core::session::Session;
use cliprobe_core::core::transport::Transport;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// cliprobe CLI
#[derive(Parser, Debug)]
#[command(
    name = "cliprobe",
    version,
    about = "Verify embedded CLI commands over serial links and tmux panes",
    long_about = None,
    arg_required_else_help = true
)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "CLIPROBE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Parse errors and missing replies tolerated
    #[arg(long, global = true)]
    max_parse_errors: Option<u32>,

    /// Write/read faults and device errors tolerated
    #[arg(long, global = true)]
    max_generic_errors: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a command over a serial port
    Serial {
        /// Command text
        command: String,
        /// Token the reply must contain (may be empty)
        expected: String,
        /// Serial device (e.g. /dev/ttyCliServer)
        device: String,
        /// Pass `true` to echo every reply window
        show_output: Option<String>,
    },

    /// Type a command into a tmux session
    Tmux {
        /// Command text
        command: String,
        /// Token the reply must contain (may be empty)
        expected: String,
        /// tmux session name
        session: String,
        /// Pass `true` to echo every reply window
        show_output: Option<String>,
    },

    /// Check a tmux pane for a token without sending anything
    Output {
        /// Token the pane must contain
        expected: String,
        /// tmux session name
        session: String,
        /// Pass `true` to echo the captured pane
        show_output: Option<String>,
    },

    /// Check that devices exist, hosts answer a ping and no error flag is set
    Preflight(PreflightArgs),
}

#[derive(Args, Debug)]
struct PreflightArgs {
    /// Device node to check (repeatable)
    #[arg(long = "device")]
    devices: Vec<PathBuf>,
    /// Host to ping (repeatable)
    #[arg(long = "host")]
    hosts: Vec<String>,
    /// Error flag that must not exist: PATH, HOST:PATH or [IPV6]:PATH (repeatable)
    #[arg(long = "flag")]
    flags: Vec<FlagLocation>,
}

impl PreflightArgs {
    fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.hosts.is_empty() && self.flags.is_empty()
    }

    fn checks(&self) -> Vec<Check> {
        self.devices
            .iter()
            .cloned()
            .map(Check::Device)
            .chain(self.hosts.iter().cloned().map(Check::Host))
            .chain(self.flags.iter().cloned().map(Check::FlagAbsent))
            .collect()
    }
}

/// `show_output` is on when the argument mentions `true`
fn wants_output(arg: Option<&str>) -> bool {
    arg.is_some_and(|a| a.contains("true"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(e.kind()));
        }
    };

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return CliResult::failure(FailureKind::Config, e.to_string()).to_exit_code();
        }
    };

    let _guard = match init_logging(&cli, &config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: cannot set up logging: {e:#}");
            return ExitCode::from(ExitCodes::FAILURE);
        }
    };

    match run(&cli, &config).await {
        Ok(result) => result.to_exit_code(),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(ExitCodes::FAILURE)
        }
    }
}

/// Install the tracing subscriber; the returned guard flushes the file sink
fn init_logging(cli: &Cli, config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        config.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let (file_layer, guard) = match cli.log_file.as_ref().or(config.file.as_ref()) {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
            let name = path.file_name().ok_or_else(|| {
                anyhow::anyhow!("log file path has no file name: {}", path.display())
            })?;
            let dir = dir.unwrap_or(std::path::Path::new("."));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let (json_layer, text_layer) = if config.json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

async fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<CliResult> {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Shutdown requested");
        handler_token.cancel();
    })?;

    let mut policy = config.retry.policy();
    if let Some(n) = cli.max_parse_errors {
        policy.max_parse_errors = n;
    }
    if let Some(n) = cli.max_generic_errors {
        policy.max_generic_errors = n;
    }

    tracing::debug!("Starting cliprobe v{}", cliprobe_core::VERSION);

    let result = match &cli.command {
        Commands::Serial {
            command,
            expected,
            device,
            show_output,
        } => {
            let transport = Transport::Serial(config.serial.transport_config(device, command));
            let show = wants_output(show_output.as_deref());
            verify(cli, transport, policy, cancel, command, expected, show).await
        }
        Commands::Tmux {
            command,
            expected,
            session,
            show_output,
        } => {
            let transport = Transport::Tmux(config.tmux.transport_config(session));
            let show = wants_output(show_output.as_deref());
            verify(cli, transport, policy, cancel, command, expected, show).await
        }
        Commands::Output {
            expected,
            session,
            show_output,
        } => {
            let transport = Transport::Tmux(config.tmux.transport_config(session));
            let show = wants_output(show_output.as_deref());
            probe_output(cli, transport, policy, cancel, expected, show).await
        }
        Commands::Preflight(args) => preflight(cli, config, args).await,
    };

    Ok(result)
}

async fn verify(
    cli: &Cli,
    transport: Transport,
    policy: RetryPolicy,
    cancel: CancellationToken,
    command: &str,
    expected: &str,
    show_output: bool,
) -> CliResult {
    let mut session = Session::new(transport, policy, cancel);
    let mut report = Report::start(
        session.transport_type(),
        session.endpoint(),
        Some(command),
        expected,
    );

    let observer: Option<WindowObserver> = if show_output {
        Some(Box::new(|window: &str| {
            println!("CLI Output (latest command):\n{window}");
        }))
    } else {
        None
    };

    let (result, verdict) = match session.verify(command, expected, observer).await {
        Ok(verdict) => (CliResult::from_verdict(&verdict), Some(verdict)),
        Err(e) => (CliResult::connection_failed(e.to_string()), None),
    };

    report.finish(&result, verdict);
    emit(cli, &report, &result);
    result
}

async fn probe_output(
    cli: &Cli,
    transport: Transport,
    policy: RetryPolicy,
    cancel: CancellationToken,
    expected: &str,
    show_output: bool,
) -> CliResult {
    let mut session = Session::new(transport, policy, cancel);
    let mut report = Report::start(session.transport_type(), session.endpoint(), None, expected);

    let result = match session.probe_output(expected).await {
        Ok(probe) => {
            if show_output {
                println!("CLI Output:\n{}", probe.captured);
            }
            if probe.passed {
                CliResult::success()
            } else {
                CliResult::failure(
                    FailureKind::VerificationFailed,
                    format!("\"{expected}\" not found in {}", session.endpoint()),
                )
            }
        }
        Err(e) if e.is_connection_error() => CliResult::connection_failed(e.to_string()),
        Err(e) => CliResult::failure(FailureKind::VerificationFailed, e.to_string()),
    };

    report.finish(&result, None);
    emit(cli, &report, &result);
    result
}

async fn preflight(cli: &Cli, config: &AppConfig, args: &PreflightArgs) -> CliResult {
    let checks = if args.is_empty() {
        PreflightArgs {
            devices: config.preflight.devices.clone(),
            hosts: config.preflight.hosts.clone(),
            flags: config.preflight.flags.clone(),
        }
        .checks()
    } else {
        args.checks()
    };

    if checks.is_empty() {
        let result = CliResult::failure(
            FailureKind::InvalidArgs,
            "nothing to check: pass --device/--host/--flag or set [preflight] in the config",
        );
        if let Some(msg) = result.message() {
            eprintln!("Error: {msg}");
        }
        return result;
    }

    let timeout = Duration::from_millis(config.preflight.host_timeout_ms);
    let results = run_checks(&checks, timeout).await;
    if !cli.quiet || cli.format == OutputFormat::Json {
        println!("{}", render_checks(&results, cli.format));
    }

    if results.len() == checks.len() && results.iter().all(|r| r.ok) {
        CliResult::success()
    } else {
        CliResult::failure(FailureKind::ConnectionFailed, "pre-flight checks failed")
    }
}

fn emit(cli: &Cli, report: &Report, result: &CliResult) {
    println!("{}", report.render(cli.format));
    if cli.format == OutputFormat::Text && !cli.quiet {
        if let CliResult::Failure(_, msg) = result {
            eprintln!("{msg}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_show_output_flag() {
        assert!(wants_output(Some("true")));
        assert!(wants_output(Some("show=true")));
        assert!(!wants_output(Some("false")));
        assert!(!wants_output(None));
    }

    #[test]
    fn test_parse_tmux_positional() {
        let args = ["cliprobe", "tmux", "state", "leader", "server-device", "true"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Tmux {
                command,
                expected,
                session,
                show_output,
            } => {
                assert_eq!(command, "state");
                assert_eq!(expected, "leader");
                assert_eq!(session, "server-device");
                assert_eq!(show_output.as_deref(), Some("true"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_expected_token() {
        let args = ["cliprobe", "serial", "reset", "", "/dev/ttyCliServer"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serial { ref expected, .. } if expected.is_empty()
        ));
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "cliprobe",
            "--format",
            "json",
            "--max-parse-errors",
            "5",
            "tmux",
            "ifconfig up",
            "Done",
            "client",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.max_parse_errors, Some(5));
        assert_eq!(cli.max_generic_errors, None);
    }

    #[test]
    fn test_missing_arguments_is_error() {
        let err = Cli::try_parse_from(["cliprobe", "tmux", "state"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_help_subcommand() {
        let err = Cli::try_parse_from(["cliprobe", "help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_preflight_repeatable() {
        let cli = Cli::try_parse_from([
            "cliprobe",
            "preflight",
            "--device",
            "/dev/ttyCliServer",
            "--device",
            "/dev/ttyCliClient",
            "--host",
            "fdde:ad00:beef::1",
            "--flag",
            "allrounder@br9:/home/allrounder/error.flag",
            "--flag",
            "/media/hdd/share/posix_border_error.flag",
        ])
        .unwrap();
        match cli.command {
            Commands::Preflight(args) => {
                assert_eq!(args.devices.len(), 2);
                assert_eq!(args.hosts, vec!["fdde:ad00:beef::1"]);
                assert_eq!(args.flags[0].host.as_deref(), Some("allrounder@br9"));
                assert_eq!(args.flags[1].host, None);

                let checks = args.checks();
                assert_eq!(checks.len(), 5);
                assert!(matches!(checks[0], Check::Device(_)));
                assert!(matches!(checks[2], Check::Host(_)));
                assert!(matches!(checks[4], Check::FlagAbsent(_)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_preflight_bad_flag() {
        let err = Cli::try_parse_from(["cliprobe", "preflight", "--flag", "br9:"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert_eq!(usage_exit_code(err.kind()), ExitCodes::FAILURE);
    }

    #[test]
    fn test_parse_errors_map_to_exit_codes() {
        let help = Cli::try_parse_from(["cliprobe", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(help.kind()), ExitCodes::SUCCESS);

        let version = Cli::try_parse_from(["cliprobe", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(version.kind()), ExitCodes::SUCCESS);

        let bare = Cli::try_parse_from(["cliprobe"]).unwrap_err();
        assert_eq!(usage_exit_code(bare.kind()), ExitCodes::FAILURE);

        let missing = Cli::try_parse_from(["cliprobe", "serial", "state"]).unwrap_err();
        assert_eq!(usage_exit_code(missing.kind()), ExitCodes::FAILURE);
    }
}
