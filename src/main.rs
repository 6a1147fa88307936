//! Millennium daemon: main entry point.
//!
//! Hexagonal architecture around a single poll loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialLink          SimulatedCallBridge   LogAudio            │
//! │  (Transport+Panel)   (CallBridge)          (AudioFeedback)     │
//! │  JsonConfigAdapter   FileStateStore        LogEventSink        │
//! │  (ConfigPort)        (StatePort)           (EventSink)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DaemonController (pure logic)               │    │
//! │  │  FrameDecoder · FSM · PluginRegistry · DisplayManager  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  console thread ──▶ ControlHandle     signaling thread ──▶ queue│
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use millennium::adapters::audio::LogAudio;
use millennium::adapters::call_bridge::SimulatedCallBridge;
use millennium::adapters::config_file::{JsonConfigAdapter, validate_config};
use millennium::adapters::console::spawn_stdin_console;
use millennium::adapters::log_sink::LogEventSink;
use millennium::adapters::serial::SerialLink;
use millennium::adapters::state_file::FileStateStore;
use millennium::app::ports::{ConfigPort, PanelPort, Ports, StatePort};
use millennium::app::service::DaemonController;
use millennium::config::SystemConfig;
use millennium::link::transport::{NullTransport, Transport};

// CLI
#[derive(Parser, Debug)]
#[command(name = "millennium")]
#[command(version)]
#[command(about = "Payphone controller: panel serial link, call state machine and plugins")]
struct Cli {
    /// JSON config file (defaults used if absent)
    #[arg(long, default_value = "/etc/millennium/config.json")]
    config: PathBuf,

    /// Override `serial.device`
    #[arg(long)]
    device: Option<PathBuf>,

    /// Run without the panel; drive the phone from the console only
    #[arg(long)]
    bench: bool,

    /// Do not read control commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Validate the config file and exit
    #[arg(long)]
    check_config: bool,
}

fn load_config(cli: &Cli) -> Result<SystemConfig> {
    let mut config = JsonConfigAdapter::new(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(device) = &cli.device {
        config.serial.device.clone_from(device);
    }
    validate_config(&config).context("environment or --device override")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .format_timestamp_millis()
    .init();

    if cli.check_config {
        println!("{}: ok", cli.config.display());
        return Ok(());
    }

    info!("╔══════════════════════════════════════╗");
    info!("║  Millennium v{:<24}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing signal handler")?;
    }

    if cli.bench {
        info!("Bench mode: no panel attached");
        run(&config, &cli, &mut NullTransport, &running)
    } else {
        let mut link = SerialLink::open(&config.serial.device, &config.serial)
            .with_context(|| format!("opening {}", config.serial.device.display()))?;
        run(&config, &cli, &mut link, &running)
    }
}

fn run<L: Transport + PanelPort>(
    config: &SystemConfig,
    cli: &Cli,
    link: &mut L,
    running: &AtomicBool,
) -> Result<()> {
    let now = Instant::now();
    let mut controller = DaemonController::new(config.clone(), now);
    controller
        .register_builtin_plugins()
        .context("registering plugins")?;

    let restored = if config.persistence.enabled {
        let store = FileStateStore::new(&config.persistence.state_file, config.persistence.fsync);
        let restored = store.load();
        controller = controller.with_store(Box::new(store));
        restored
    } else {
        None
    };

    let mut calls = SimulatedCallBridge::spawn(&config.bridge, Arc::clone(controller.queue()));
    let mut audio = LogAudio::new();
    let mut sink = LogEventSink::new();

    {
        let mut ports = Ports {
            calls: &mut calls,
            panel: &mut *link,
            audio: &mut audio,
            sink: &mut sink,
        };
        controller.start(restored, &mut ports, now);
    }

    if !cli.no_console {
        if let Err(e) = spawn_stdin_console(controller.control_handle(), Some(calls.ringer())) {
            warn!("Console unavailable: {}", e);
        }
    }

    info!("System ready. Entering poll loop.");
    let poll = Duration::from_millis(config.system.poll_interval_ms);
    while running.load(Ordering::SeqCst) {
        controller.run_once(link, &mut calls, &mut audio, &mut sink, Instant::now());
        thread::sleep(poll);
    }

    info!("Shutdown requested");
    controller.shutdown(&mut calls);
    Ok(())
}
