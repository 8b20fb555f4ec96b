// crates/stac-auth-proxy-cli/src/main.rs
// ============================================================================
// Module: STAC Auth Proxy CLI Entry Point
// Description: Command dispatcher for serving and configuration checks.
// Purpose: Load configuration, install logging, and run the proxy.
// Dependencies: clap, stac-auth-proxy, stac-auth-proxy-config, tokio,
//               tracing, tracing-subscriber
// ============================================================================

//! ## Overview
//! `stac-auth-proxy serve` loads configuration (explicit path, then
//! `STAC_AUTH_PROXY_CONFIG`, then environment keys), runs the startup checks,
//! and serves until Ctrl-C. `stac-auth-proxy config check` loads and validates
//! the same configuration and prints a summary. Logging goes through
//! `tracing-subscriber` with `RUST_LOG` (default `info`).

// ============================================================================
// SECTION: Modules
// ============================================================================

mod logging;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use stac_auth_proxy::ProxyServer;
use stac_auth_proxy_config::MutationPolicy;
use stac_auth_proxy_config::ProxyConfig;
use thiserror::Error;
use tracing::info;

use crate::logging::LogFormat;
use crate::logging::init_tracing;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "stac-auth-proxy", version, disable_help_subcommand = true)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the proxy server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to `STAC_AUTH_PROXY_CONFIG` or env keys).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Listener address overriding `server.bind`.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate configuration, then print a summary.
    Check(ConfigCheckCommand),
}

/// Configuration for the `config check` command.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format).map_err(|err| CliError::new(format!("logging: {err}")))?;
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command: ConfigCommand::Check(command),
        } => command_config_check(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Loads configuration and applies the `--bind` override.
fn load_config(path: Option<&Path>, bind: Option<String>) -> CliResult<ProxyConfig> {
    let mut config = ProxyConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    if let Some(bind) = bind {
        config.server.bind = bind;
        config.validate().map_err(|err| CliError::new(format!("invalid --bind: {err}")))?;
    }
    Ok(config)
}

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let source = command
        .config
        .as_ref()
        .map_or_else(|| "<environment>".to_string(), |path| path.display().to_string());
    let config = load_config(command.config.as_deref(), command.bind)?;
    info!(
        config = %source,
        bind = %config.server.bind,
        "configuration loaded"
    );
    let server = ProxyServer::bootstrap(config)
        .await
        .map_err(|err| CliError::new(format!("proxy failed to start: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("proxy stopped: {err}")))?;
    info!("proxy shut down cleanly");
    Ok(ExitCode::SUCCESS)
}

/// Executes the `config check` command.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref(), None)?;
    write_stdout_line(&config_summary(&config))
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Renders a one-screen summary of a validated configuration.
fn config_summary(config: &ProxyConfig) -> String {
    let binding = |binding: Option<&stac_auth_proxy_config::FilterBinding>| {
        binding.map_or_else(|| "none".to_string(), |binding| binding.generator.clone())
    };
    let policy = match config.filters.mutation_policy {
        MutationPolicy::Reject => "reject",
        MutationPolicy::Validate => "validate",
    };
    let root = if config.server.root_path.is_empty() { "/" } else { &config.server.root_path };
    [
        "config ok".to_string(),
        format!("  bind: {}", config.server.bind),
        format!("  upstream: {}", config.upstream.url),
        format!("  root_path: {root}"),
        format!("  oidc discovery: {}", config.oidc.discovery_url),
        format!(
            "  access: default_public={} public_rules={} private_rules={}",
            config.access.default_public,
            config.access.public_endpoints.len(),
            config.access.private_endpoints.len()
        ),
        format!(
            "  filters: items={} collections={} mutation_policy={policy}",
            binding(config.filters.items.as_ref()),
            binding(config.filters.collections.as_ref())
        ),
    ]
    .join("\n")
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
