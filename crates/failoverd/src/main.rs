// # failoverd - DNS failover daemon
//
// Thin integration layer: reads configuration from the environment, sets up
// logging and the runtime, wires the registered provider, probe and state
// store into a `FailoverEngine`, and runs one of the subcommands below. All
// decision logic lives in failover-core.
//
// ## Commands
//
// - `run` (default): probe the primary every tick until SIGINT/SIGTERM
// - `check`: one tick (probe, decide, apply) and exit
// - `failover` / `restore`: point the record at the backup / primary
// - `status`: print persisted state and the provider's record as JSON
//
// `run`, `check`, `failover` and `restore` hold the state lock while they
// work, so a manual command fails fast while the daemon is running. `status`
// is read-only and takes no lock.
//
// ## Configuration
//
// - `FAILOVER_RECORD`: DNS record to manage (e.g. app.example.com)
// - `FAILOVER_PRIMARY_IP` / `FAILOVER_BACKUP_IP`: the two addresses
// - `FAILOVER_CF_API_TOKEN` / `FAILOVER_CF_ZONE_ID`: Cloudflare credentials
// - `FAILOVER_CF_ACCOUNT_ID`, `FAILOVER_TTL`: optional
// - `FAILOVER_MODE`: `live` (default) or `dry-run`
// - `FAILOVER_PROBE_TYPE`: `http` (default) or `tcp`, with
//   `FAILOVER_PROBE_PORT`, `FAILOVER_PROBE_HTTPS_PORT`, `FAILOVER_PROBE_PATH`,
//   `FAILOVER_PROBE_HOST`
// - `FAILOVER_STATE_STORE_TYPE`: `file` (default) or `memory`
// - `FAILOVER_STATE_FILE`: state file path (default /var/lib/failover/state.json)
// - `FAILOVER_TICK_INTERVAL_SECS`, `FAILOVER_PROBE_TIMEOUT_SECS`,
//   `FAILOVER_PROBE_DEADLINE_SECS`, `FAILOVER_DNS_TIMEOUT_SECS`
// - `FAILOVER_LATENCY_THRESHOLD_MS`, `FAILOVER_FAILURE_STREAK`,
//   `FAILOVER_LATENCY_STREAK`, `FAILOVER_STABILITY_SECS`,
//   `FAILOVER_MIN_SUCCESSES`
// - `FAILOVER_INITIAL_TARGET`: `primary` (default) or `backup`
// - `FAILOVER_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// Logs go to stderr; command payloads go to stdout.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Settings, describe_address};
use failover_core::{
    Direction, EngineEvent, FailoverConfig, FailoverEngine, ProviderRegistry, StateLock,
    TickOutcome,
};
use serde_json::json;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Success / clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime or operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<FailoverExitCode> for ExitCode {
    fn from(code: FailoverExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(name = "failoverd", version)]
#[command(about = "Primary/backup DNS failover daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the failover loop until SIGINT/SIGTERM (default)
    Run,
    /// Probe the primary once and apply the resulting decision
    Check,
    /// Point the record at the backup address
    Failover,
    /// Point the record at the primary address
    Restore,
    /// Print engine state and the provider's current record
    Status,
}

impl Command {
    fn takes_lock(self) -> bool {
        !matches!(self, Command::Status)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FailoverExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return FailoverExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FailoverExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FailoverExitCode::RuntimeError.into();
        }
    };

    rt.block_on(execute(command, settings.failover)).into()
}

async fn execute(command: Command, config: FailoverConfig) -> FailoverExitCode {
    // Held until the command finishes
    let _lock = if command.takes_lock() {
        match acquire_lock(&config) {
            Ok(lock) => lock,
            Err(e) => {
                error!("{:#}", e);
                return FailoverExitCode::ConfigError;
            }
        }
    } else {
        None
    };

    let (engine, events) = match build_engine(&config).await {
        Ok(built) => built,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return FailoverExitCode::ConfigError;
        }
    };

    let result = match command {
        Command::Run => run(engine, events).await,
        Command::Check => check(&engine).await,
        Command::Failover => force(&engine, Direction::Failover).await,
        Command::Restore => force(&engine, Direction::Restore).await,
        Command::Status => status(&engine).await,
    };

    result.unwrap_or_else(|e| {
        error!("{:?} failed: {:#}", command, e);
        FailoverExitCode::RuntimeError
    })
}

fn acquire_lock(config: &FailoverConfig) -> Result<Option<StateLock>> {
    match config.state_store.file_path() {
        Some(path) => Ok(Some(StateLock::acquire(path)?)),
        None => Ok(None),
    }
}

async fn build_engine(
    config: &FailoverConfig,
) -> Result<(FailoverEngine, mpsc::Receiver<EngineEvent>)> {
    let registry = ProviderRegistry::with_builtin_state_stores();

    #[cfg(feature = "cloudflare")]
    failover_provider_cloudflare::register(&registry);

    #[cfg(feature = "http")]
    failover_probe_http::register(&registry);

    debug!(
        providers = ?registry.list_providers(),
        probes = ?registry.list_probes(),
        state_stores = ?registry.list_state_stores(),
        "Registry populated"
    );

    let provider = registry
        .create_provider(&config.provider)
        .context("Failed to create DNS provider")?;
    let probe = registry
        .create_probe(&config.probe)
        .context("Failed to create health probe")?;
    let state_store = registry
        .create_state_store(&config.state_store, &config.record.name)
        .await
        .context("Failed to open state store")?;

    Ok(FailoverEngine::new(probe, provider, state_store, config)?)
}

async fn run(
    engine: FailoverEngine,
    events: mpsc::Receiver<EngineEvent>,
) -> Result<FailoverExitCode> {
    info!("Starting failoverd");
    tokio::spawn(log_events(events));

    let state = engine.run().await?;

    info!(
        current_target = %state.current_target(),
        samples = state.samples_processed(),
        "failoverd stopped"
    );
    Ok(FailoverExitCode::Success)
}

async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "Engine event");
    }
}

async fn check(engine: &FailoverEngine) -> Result<FailoverExitCode> {
    let mut state = engine.load_state().await;
    let report = engine.tick(&mut state).await;

    let code = match report.outcome {
        TickOutcome::Steady | TickOutcome::Applied(_) => FailoverExitCode::Success,
        TickOutcome::ActionFailed(_) | TickOutcome::PersistFailed(_) => {
            FailoverExitCode::RuntimeError
        }
    };

    print_json(&json!({
        "command": "check",
        "success": code == FailoverExitCode::Success,
        "report": report,
        "status": engine.status(&state),
    }))?;
    Ok(code)
}

async fn force(engine: &FailoverEngine, direction: Direction) -> Result<FailoverExitCode> {
    let mut state = engine.load_state().await;

    match engine.force(&mut state, direction).await {
        Ok(outcome) => {
            print_json(&json!({
                "command": direction.to_string(),
                "success": true,
                "outcome": outcome,
                "status": engine.status(&state),
            }))?;
            Ok(FailoverExitCode::Success)
        }
        Err(e) => {
            error!("Manual {} failed: {}", direction, e);
            print_json(&json!({
                "command": direction.to_string(),
                "success": false,
                "error": e.to_string(),
                "status": engine.status(&state),
            }))?;
            Ok(FailoverExitCode::RuntimeError)
        }
    }
}

async fn status(engine: &FailoverEngine) -> Result<FailoverExitCode> {
    let state = engine.load_state().await;
    let snapshot = engine.status_with_provider(&state).await;

    let provider_target = snapshot
        .provider_address
        .map(|address| describe_address(engine.targets(), address));

    let mut payload = serde_json::to_value(&snapshot)?;
    payload["provider_target"] = json!(provider_target);
    payload["drift"] = json!(snapshot.has_drift());

    print_json(&payload)?;
    Ok(FailoverExitCode::Success)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
