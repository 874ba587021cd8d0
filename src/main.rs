use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use recon_scan_rs::{Engine, EngineConfig, ReconError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// recon-scan-rs — liveness check, sequential TCP port scan and HTTP verb probing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "recon-scan-rs",
    version,
    about = "Liveness check, sequential TCP port scan and HTTP verb probing with plain-text reports.",
    long_about = None
)]
struct Cli {
    /// Enable debug diagnostics on stderr (RUST_LOG takes precedence).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Ping the host, then scan a TCP port range one port at a time.
    Scan(ScanArgs),
    /// Send OPTIONS, GET, POST, HEAD, PUT, DELETE and PATCH to one URL path.
    Http(HttpArgs),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Target hostname or IP address.
    #[arg(long)]
    host: String,

    /// Directory the report file is written into.
    #[arg(long = "report-dir", default_value = ".")]
    report_dir: PathBuf,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Port or inclusive range, e.g. `22` or `20-25`.
    #[arg(long)]
    ports: String,

    /// Per-port connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 300)]
    timeout_ms: u64,

    /// Liveness (ping) timeout in milliseconds.
    #[arg(long = "liveness-timeout-ms", default_value_t = 1000)]
    liveness_timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
struct HttpArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Target port.
    #[arg(long, default_value_t = 80)]
    port: u16,

    /// URL path; a leading `/` is added when missing.
    #[arg(long, default_value = "/")]
    path: String,

    /// Per-request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 8000)]
    timeout_ms: u64,

    /// Use HTTPS (certificate checks disabled).
    #[arg(long, default_value_t = false)]
    tls: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan(args) => run_scan(args).await,
        Command::Http(args) => run_http(args).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run_scan(args: ScanArgs) -> Result<ExitCode> {
    let config = EngineConfig {
        port_timeout: Duration::from_millis(args.timeout_ms),
        liveness_timeout: Duration::from_millis(args.liveness_timeout_ms),
        report_dir: args.common.report_dir.clone(),
        ..EngineConfig::default()
    };

    println!("recon-scan-rs port scan:");
    println!("  host         : {}", args.common.host);
    println!("  ports        : {}", args.ports);
    println!("  timeout_ms   : {}", args.timeout_ms);
    println!("  report_dir   : {}", args.common.report_dir.display());
    println!();

    // Ctrl-C stops the scan between ports.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let engine = Engine::new(config);
    let mut log = |line: &str| println!("{line}");
    let run = match engine
        .run_port_scan_spec(&args.common.host, &args.ports, &cancel, &mut log)
        .await
    {
        Ok(run) => run,
        Err(e) => return Ok(report_fatal(&e)),
    };

    if let Some(path) = args.common.json.as_deref() {
        write_json(path, &run)?;
    }

    if run.interrupted {
        return Ok(ExitCode::from(130));
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_http(args: HttpArgs) -> Result<ExitCode> {
    let config = EngineConfig {
        http_timeout: Duration::from_millis(args.timeout_ms),
        report_dir: args.common.report_dir.clone(),
        tls: args.tls,
        ..EngineConfig::default()
    };

    println!("recon-scan-rs HTTP verb probe:");
    println!("  host         : {}", args.common.host);
    println!("  port         : {}", args.port);
    println!("  path         : {}", args.path);
    println!("  timeout_ms   : {}", args.timeout_ms);
    println!("  tls          : {}", args.tls);
    println!("  report_dir   : {}", args.common.report_dir.display());
    println!();

    let engine = Engine::new(config);
    let mut log = |line: &str| println!("{line}");
    let run = match engine
        .run_http_probe(&args.common.host, args.port, &args.path, &mut log)
        .await
    {
        Ok(run) => run,
        Err(e) => return Ok(report_fatal(&e)),
    };

    if let Some(path) = args.common.json.as_deref() {
        write_json(path, &run)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Print a fatal engine error and map it to an exit code.
fn report_fatal(e: &ReconError) -> ExitCode {
    match e {
        // The engine already streamed the user-facing message.
        ReconError::Unreachable(_) => ExitCode::from(2),
        ReconError::Validation(_) => {
            eprintln!("[!] {e}");
            ExitCode::from(64)
        }
        _ => {
            eprintln!("[!] {e}");
            ExitCode::FAILURE
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON output {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("failed to write JSON output {}", path.display()))?;
    println!("Wrote JSON results to {}", path.display());
    Ok(())
}
