//! lxd-storage
//!
//! Applies a pool or volume manifest to an LXD server and prints the
//! outcome as JSON on stdout. Logs go to stderr.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lxd_storage_reconciler::client::{DEFAULT_SNAP_URL, DEFAULT_URL};
use lxd_storage_reconciler::{
    ClientConfig, Error, LxdClient, Reconciler, ResourceManifest, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Declarative reconciler for LXD storage pools and volumes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converge the resource described by a manifest
    Apply(ApplyArgs),
    /// Report what `apply` would do without changing anything
    Plan(ApplyArgs),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Manifest file (YAML)
    #[arg(short = 'f', long = "file")]
    manifest: PathBuf,

    /// Check mode: report actions without performing them
    #[arg(long)]
    check: bool,

    /// Unix socket path (unix:/path) or https URL of the LXD server
    #[arg(long, env = "LXD_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Socket used when LXD is installed from the snap package
    #[arg(long, env = "LXD_SNAP_URL", default_value = DEFAULT_SNAP_URL)]
    snap_url: String,

    /// Client certificate (defaults to ~/.config/lxc/client.crt)
    #[arg(long, alias = "cert-file", env = "LXD_CLIENT_CERT")]
    client_cert: Option<PathBuf>,

    /// Client key (defaults to ~/.config/lxc/client.key)
    #[arg(long, alias = "key-file", env = "LXD_CLIENT_KEY")]
    client_key: Option<PathBuf>,

    /// Trust password used to register the client certificate
    #[arg(long, env = "LXD_TRUST_PASSWORD", hide_env_values = true)]
    trust_password: Option<String>,

    /// Include the request/response log in the report
    #[arg(short, long)]
    verbose: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let (args, check) = match cli.command {
        Command::Apply(args) => {
            let check = args.check;
            (args, check)
        }
        Command::Plan(args) => (args, true),
    };

    match run(args, check).await {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{}", e);
            println!("{}", serde_json::json!({"failed": true, "changed": false, "msg": e.to_string()}));
            ExitCode::FAILURE
        }
    }
}

/// Reconcile one manifest; `Ok(false)` means the run failed after starting
async fn run(args: ApplyArgs, check: bool) -> Result<bool> {
    let desired = ResourceManifest::from_path(&args.manifest)?.into_desired();

    let config = ClientConfig {
        url: args.url,
        snap_url: args.snap_url,
        client_cert: args.client_cert,
        client_key: args.client_key,
        home: std::env::var_os("HOME").map(PathBuf::from),
        debug: args.verbose,
    };
    let client = LxdClient::new(&config)?;

    info!(
        "Reconciling {} {} (state: {}, check mode: {})",
        desired.identity.kind_label(),
        desired.identity,
        desired.state,
        check
    );

    let reconciler = Reconciler::new(Arc::new(client))
        .with_trust_password(args.trust_password)
        .with_dry_run(check)
        .with_logs(args.verbose);

    match reconciler.reconcile(&desired).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
            Ok(false)
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(cli: &Cli) -> Result<()> {
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directive = |d: &str| -> Result<Directive> {
        d.parse()
            .map_err(|e| Error::Configuration(format!("invalid log directive {}: {}", d, e)))
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("reqwest=warn")?);

    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
