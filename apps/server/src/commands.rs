//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use fieldcheck_core::SheetService;
use fieldcheck_sheets::GoogleSheetsSource;
use fieldcheck_shared::{
    AppConfig, ServiceConfig, init_config, load_config, load_config_from, validate_spreadsheet,
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::routes::{self, StaticFiles};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// fieldcheck: assignments and instruction texts from the field-check spreadsheet.
#[derive(Parser)]
#[command(
    name = "fieldcheck",
    version,
    about = "Serve tester assignments and check instructions from a Google spreadsheet.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.fieldcheck/fieldcheck.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API.
    Serve {
        /// Bind address (overrides `server.host`).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides `server.port`).
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Check access to the spreadsheet and print what was found.
    Check,

    /// Print the wave-1 assignments of a tester.
    Lookup {
        /// Full name as written in the assignment sheet.
        fio: String,

        /// Also print match diagnostics.
        #[arg(long)]
        debug: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "fieldcheck=info,tower_http=info",
        1 => "fieldcheck=debug,tower_http=debug",
        _ => "fieldcheck=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { host, port } => cmd_serve(resolve_config(&cli.config)?, host, port).await,
        Command::Check => cmd_check(&resolve_config(&cli.config)?).await,
        Command::Lookup { fio, debug } => {
            cmd_lookup(&resolve_config(&cli.config)?, &fio, debug).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli.config)?).await,
        },
    }
}

/// Load `--config` when given, otherwise the default config file.
fn resolve_config(path: &Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Build the sheet service on top of the Google Sheets source.
fn build_service(config: &AppConfig) -> Result<Arc<SheetService>> {
    validate_spreadsheet(config)?;
    let source = GoogleSheetsSource::from_config(&config.spreadsheet)?;
    Ok(Arc::new(SheetService::new(
        Arc::new(source),
        ServiceConfig::from(config),
    )))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let service = build_service(&config)?;
    let refresher = service.start_refresher();

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| eyre!("invalid bind address '{host}:{port}': {e}"))?;

    let static_files = config.server.static_dir.as_ref().map(|dir| StaticFiles {
        dir: PathBuf::from(dir),
        index_file: config.server.index_file.clone(),
    });
    let app = routes::router(Arc::clone(&service), static_files);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                error!(%addr, "port is already in use");
            }
            return Err(eyre!("failed to bind {addr}: {e}"));
        }
    };
    info!(%addr, ttl = ?service.config().ttl, "serving fieldcheck API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.stop().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn cmd_check(config: &AppConfig) -> Result<()> {
    let service = build_service(config)?;
    let report = service.debug_connection().await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    match report.failure {
        None => Ok(()),
        Some(failure) => Err(eyre!(
            "connection check failed at '{}': {}",
            failure.step,
            failure.error
        )),
    }
}

/// Trimmed name argument; blank names are rejected like on `/api/assignments`.
fn required_name(fio: &str) -> Result<&str> {
    let fio = fio.trim();
    if fio.is_empty() {
        return Err(eyre!("fio is required"));
    }
    Ok(fio)
}

async fn cmd_lookup(config: &AppConfig, fio: &str, debug: bool) -> Result<()> {
    let fio = required_name(fio)?;
    let service = build_service(config)?;
    let report = service.get_assignments(fio).await?;

    if report.items.is_empty() {
        println!("No wave-1 assignments for '{fio}'.");
    }
    for item in &report.items {
        println!("  [{}] {} ({})", item.id, item.display, item.city);
    }

    if debug || report.items.is_empty() {
        println!();
        println!("{}", serde_json::to_string_pretty(&report.diagnostics)?);
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lookup_name_is_rejected() {
        for blank in ["", "   ", "\t\n"] {
            let err = required_name(blank).unwrap_err();
            assert_eq!(err.to_string(), "fio is required");
        }
    }

    #[test]
    fn lookup_name_is_trimmed() {
        assert_eq!(required_name("  Иван Иванов ").unwrap(), "Иван Иванов");
    }

    #[tokio::test]
    async fn blank_lookup_fails_before_touching_the_sheet() {
        let err = cmd_lookup(&AppConfig::default(), "  ", false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "fio is required");
    }
}
