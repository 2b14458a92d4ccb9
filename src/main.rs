//! SenseShift CLI
//!
//! Digital-wellbeing sampler and mindfulness reminder demo.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sense_shift::{
    biometrics::{BiometricsProvider, EmptyBiometrics, FileBiometrics},
    clock::{Clock, SystemClock, TokioClock},
    collector::{check_permission, ensure_permission, Collector},
    config::Config,
    core::{SessionExport, SnapshotSampler, TapAccumulator},
    effects::{system_notifier, ConsoleNotifier, JsonLogStore, LogStore, Notifier},
    engine::{std_rng, EngineCommand, EngineRunner, StateEngine},
    system::HostProbe,
    transparency::{create_shared_log_with_persistence, TransparencyLog},
    PRIVACY_DECLARATION, VERSION,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "remote")]
use sense_shift::effects::RemoteLogStore;

#[derive(Parser)]
#[command(name = "senseshift")]
#[command(version = VERSION)]
#[command(about = "Digital-wellbeing sampler and mindfulness reminder demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a wellbeing snapshot as JSON every sample interval
    Sample {
        /// Health-data export to read biometrics from
        #[arg(long)]
        biometrics: Option<PathBuf>,

        /// Seconds between snapshots
        #[arg(long)]
        interval: Option<u64>,

        /// IANA timezone for "today" (e.g. Europe/Berlin)
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Run the reminder demo. Reads hide, show, relax, reset and quit from stdin
    Demo {
        /// Seed for reproducible drift
        #[arg(long)]
        seed: Option<u64>,

        /// Log notifications to the console instead of the notification center
        #[arg(long)]
        no_notify: bool,

        /// Audit-log owner (defaults to the configured user)
        #[arg(long)]
        user: Option<String>,
    },

    /// Pause sampling
    Pause,

    /// Resume sampling
    Resume,

    /// Show current status and statistics
    Status,

    /// Show privacy declaration
    Privacy,

    /// Show the reminder audit log
    Logs {
        /// Audit-log owner (defaults to the configured user)
        #[arg(long)]
        user: Option<String>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sample {
            biometrics,
            interval,
            timezone,
        } => cmd_sample(biometrics, interval, timezone).await,
        Commands::Demo {
            seed,
            no_notify,
            user,
        } => cmd_demo(seed, no_notify, user).await,
        Commands::Pause => cmd_set_paused(true),
        Commands::Resume => cmd_set_paused(false),
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
        Commands::Logs { user } => cmd_logs(user).await,
        Commands::Config => cmd_config(),
    }
}

/// Logs go to stderr; stdout carries only snapshots and demo state.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_sample(
    biometrics_path: Option<PathBuf>,
    interval: Option<u64>,
    timezone: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::load().context("could not load config")?;
    if biometrics_path.is_some() {
        config.biometrics_path = biometrics_path;
    }
    if let Some(secs) = interval {
        config.sample_interval = std::time::Duration::from_secs(secs.max(1));
    }
    if timezone.is_some() {
        config.timezone = timezone;
    }
    config.validate()?;
    let tz = config.timezone()?;

    eprintln!("SenseShift v{VERSION}");

    if let Err(e) = ensure_permission() {
        eprintln!("Error: {e}.");
        eprintln!();
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
        return Err(e).context("keyboard hook unavailable");
    }

    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "could not create data directories");
    }

    let transparency = create_shared_log_with_persistence(config.transparency_path());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let taps = Arc::new(TapAccumulator::with_window(clock, config.tap_window));

    let biometrics: Arc<dyn BiometricsProvider> = match &config.biometrics_path {
        Some(path) => Arc::new(FileBiometrics::new(path)),
        None => {
            tracing::info!("no biometrics export configured; biometrics fields will be empty");
            Arc::new(EmptyBiometrics)
        }
    };
    if let Err(e) = biometrics.authorize().await {
        tracing::warn!(error = %e, "biometrics access not granted; snapshots will be dropped until it is");
    }

    let mut collector = Collector::new(taps.clone());
    collector
        .start()
        .context("could not install the keyboard hook")?;

    let export = SessionExport::new(&config.export_path, transparency.session_id(), Utc::now());
    let sampler = SnapshotSampler::new(Arc::new(HostProbe), taps, biometrics, transparency.clone())
        .with_lookback(config.biometrics_lookback)
        .with_timezone(tz)
        .with_export(export);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    install_ctrlc(shutdown_tx)?;

    if config.paused {
        eprintln!("Sampling is currently paused. Run `senseshift resume` to continue.");
    }
    eprintln!(
        "Sampling every {}s. Press Ctrl+C to stop.",
        config.sample_interval.as_secs()
    );

    let is_paused = || Config::load().map(|c| c.paused).unwrap_or(false);
    let mut stdout = std::io::stdout();
    let emitted = sampler
        .run(config.sample_interval, &mut stdout, shutdown_rx, is_paused)
        .await;

    eprintln!();
    eprintln!("Stopping...");
    collector.stop();

    if let Err(e) = transparency.save() {
        tracing::warn!(error = %e, "could not save transparency log");
    }

    if let Some(export) = sampler.into_export().filter(|export| export.written() > 0) {
        eprintln!(
            "Exported {} of {emitted} snapshots to {:?}",
            export.written(),
            export.path()
        );
    }

    eprintln!();
    eprintln!("{}", transparency.summary());
    Ok(())
}

async fn cmd_demo(seed: Option<u64>, no_notify: bool, user: Option<String>) -> anyhow::Result<()> {
    let config = Config::load().context("could not load config")?;
    let user_id = user.unwrap_or_else(|| config.user_id.clone());

    let transparency = create_shared_log_with_persistence(config.transparency_path());
    let notifier: Arc<dyn Notifier> = if no_notify || !config.notifications {
        Arc::new(ConsoleNotifier)
    } else {
        system_notifier()
    };
    let store = log_store(&config)?;

    let engine = StateEngine::new(std_rng(seed), Arc::new(TokioClock));
    let runner = EngineRunner::new(engine, notifier, store, user_id, transparency.clone());

    let (command_tx, command_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    install_ctrlc(shutdown_tx.clone())?;

    eprintln!("SenseShift demo v{VERSION}");
    eprintln!("Commands: hide, show, relax, reset, quit");
    eprintln!();

    // Blocking stdin reads cannot be cancelled, so they get a detached thread.
    std::thread::Builder::new()
        .name("demo-stdin".to_string())
        .spawn(move || read_commands(command_tx, shutdown_tx))
        .context("could not start the command reader")?;

    let mut stdout = std::io::stdout();
    let engine = runner.run(command_rx, shutdown_rx, &mut stdout).await;

    if let Err(e) = transparency.save() {
        tracing::warn!(error = %e, "could not save transparency log");
    }

    eprintln!();
    eprintln!("Final state: {}", engine.state().summary());
    Ok(())
}

fn read_commands(commands: mpsc::Sender<EngineCommand>, shutdown: watch::Sender<bool>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            let _ = shutdown.send(true);
            return;
        }

        match line.parse::<EngineCommand>() {
            Ok(command) => {
                if commands.blocking_send(command).is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{e} (try hide, show, relax, reset or quit)"),
        }
    }
}

fn log_store(config: &Config) -> anyhow::Result<Arc<dyn LogStore>> {
    #[cfg(feature = "remote")]
    if let Some(remote) = &config.remote_log {
        return Ok(Arc::new(RemoteLogStore::new(remote.clone())?));
    }

    #[cfg(not(feature = "remote"))]
    if config.remote_log.is_some() {
        tracing::warn!("remote_log is set but this build has no `remote` feature; logging locally");
    }

    Ok(Arc::new(JsonLogStore::new(&config.data_path)))
}

fn cmd_set_paused(paused: bool) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.paused = paused;
    config.save().context("could not save config")?;

    if paused {
        println!("Sampling paused. Use 'senseshift resume' to continue.");
    } else {
        println!("Sampling resumed.");
    }
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("SenseShift Status");
    println!("=================");
    println!();

    println!(
        "Input Monitoring Permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Sample interval: {}s", config.sample_interval.as_secs());
    println!("  Tap window: {}s", config.tap_window.as_secs());
    match &config.biometrics_path {
        Some(path) => println!("  Biometrics export: {path:?}"),
        None => println!("  Biometrics export: none"),
    }
    println!("  User: {}", config.user_id);
    println!("  Paused: {}", config.paused);
    println!();

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        let stats = TransparencyLog::with_persistence(stats_path).stats();
        println!("Cumulative Statistics:");
        println!("  Keyboard taps counted: {}", stats.taps_counted);
        println!("  Sampler ticks: {}", stats.ticks);
        println!("  Snapshots emitted: {}", stats.snapshots_emitted);
        println!("  Snapshots dropped: {}", stats.snapshots_dropped);
        println!("  Reminders fired: {}", stats.reminders_fired);
        println!("  Failed log appends: {}", stats.log_appends_failed);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

async fn cmd_logs(user: Option<String>) -> anyhow::Result<()> {
    let config = Config::load().context("could not load config")?;
    let user_id = user.unwrap_or_else(|| config.user_id.clone());
    let store = log_store(&config)?;

    let entries = store.entries(&user_id).await?;
    if entries.is_empty() {
        println!("No reminders logged for {user_id}.");
        return Ok(());
    }

    for entry in entries {
        let kind = serde_json::to_value(entry.kind)?;
        let risk = entry
            .risk_score
            .map(|r| format!(" (risk {r:.2})"))
            .unwrap_or_default();
        println!(
            "{}  {:<15} {}{}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            kind.as_str().unwrap_or_default(),
            entry.message,
            risk
        );
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let mut config = Config::load().context("could not load config")?;
    config.remote_log = config.remote_log.map(|remote| remote.redacted());

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Flip `shutdown` on Ctrl+C.
fn install_ctrlc(shutdown: watch::Sender<bool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        let _ = shutdown.send(true);
    })
    .context("could not set Ctrl+C handler")
}
