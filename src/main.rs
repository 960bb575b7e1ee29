//! Touch Feature Agent CLI
//!
//! Routes touch events onto a fixed set of channels and streams per-channel
//! features to a synthesis engine and a streaming bus.

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use touch_feature_agent::{
    collector::{NoopCollector, ReplayCollector, ReplayConfig, ReplaySource, TouchEvent},
    config::{Config, GridMode, OriginMode},
    core::{ChannelPool, FeatureBroadcaster, TouchRouter, FEATURES_PER_CHANNEL, FEATURE_NAMES},
    sink::SinkSet,
    stats::create_shared_stats,
    VERSION,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "touch-agent")]
#[command(version = VERSION)]
#[command(about = "Multi-touch channel multiplexer and feature broadcaster", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start routing touches and broadcasting features
    Run {
        /// Replay a JSON Lines touch script (`-` for stdin); idle if omitted
        #[arg(long, short)]
        input: Option<String>,

        /// Number of broadcast channels
        #[arg(long)]
        channels: Option<usize>,

        /// Origin of the positional grid (bottom_left, center, center_bottom)
        #[arg(long)]
        origin: Option<String>,

        /// Positional grid shape (circular, rectangular)
        #[arg(long)]
        grid: Option<String>,

        /// Broadcast period in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// OSC endpoint of the synthesis engine
        #[arg(long)]
        osc_addr: Option<String>,

        /// Streaming bus endpoint for positional samples
        #[arg(long)]
        outlet_addr: Option<String>,

        /// Log every feature vector
        #[arg(long)]
        print: bool,

        /// Accept mouse events instead of touch events
        #[arg(long)]
        mouse: bool,
    },

    /// Show configuration
    Config,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the broadcast feature layout
    Features {
        /// Number of channels to lay out
        #[arg(long)]
        channels: Option<usize>,
    },
}

/// CLI overrides applied on top of the loaded configuration.
struct RunOverrides {
    channels: Option<usize>,
    origin: Option<String>,
    grid: Option<String>,
    tick_ms: Option<u64>,
    osc_addr: Option<String>,
    outlet_addr: Option<String>,
    print: bool,
    mouse: bool,
}

impl RunOverrides {
    fn apply(self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        if let Some(origin) = self.origin {
            config.origin = origin.parse::<OriginMode>()?;
        }
        if let Some(grid) = self.grid {
            config.grid = grid.parse::<GridMode>()?;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_period = Duration::from_millis(ms);
        }
        if let Some(addr) = self.osc_addr {
            config.sinks.osc_addr = Some(addr);
        }
        if let Some(addr) = self.outlet_addr {
            config.sinks.outlet_addr = Some(addr);
        }
        if self.print {
            config.sinks.print_features = true;
        }
        if self.mouse {
            config.touch_device = "mouse".to_string();
        }
        Ok(())
    }
}

/// Where touch events come from for this run.
enum EventSource {
    Replay(ReplayCollector),
    Idle(NoopCollector),
}

impl EventSource {
    fn receiver(&self) -> Receiver<TouchEvent> {
        match self {
            EventSource::Replay(collector) => collector.receiver().clone(),
            EventSource::Idle(collector) => collector.receiver().clone(),
        }
    }

    fn stop(&mut self) {
        match self {
            EventSource::Replay(collector) => collector.stop(),
            EventSource::Idle(collector) => collector.stop(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run {
            input,
            channels,
            origin,
            grid,
            tick_ms,
            osc_addr,
            outlet_addr,
            print,
            mouse,
        } => cmd_run(
            input,
            RunOverrides {
                channels,
                origin,
                grid,
                tick_ms,
                osc_addr,
                outlet_addr,
                print,
                mouse,
            },
        ),
        Commands::Config => cmd_config(),
        Commands::InitConfig { force } => cmd_init_config(force),
        Commands::Features { channels } => cmd_features(channels),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_run(input: Option<String>, overrides: RunOverrides) -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    overrides.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    println!("Touch Feature Agent v{VERSION}");
    println!();
    println!("  Channels: {}", config.channels);
    println!("  Tick: {} ms", config.tick_period.as_millis());
    println!("  {}", config.stream_type());
    println!("  Touch device: {}", config.touch_device);
    println!(
        "  OSC: {}",
        config.sinks.osc_addr.as_deref().unwrap_or("disabled")
    );
    println!(
        "  Outlet: {}",
        config.sinks.outlet_addr.as_deref().unwrap_or("disabled")
    );

    let stats = create_shared_stats();
    let pool = ChannelPool::from_config(&config).into_shared();
    let router = TouchRouter::new(pool.clone(), &config, stats.clone());

    let sinks = SinkSet::from_config(&config).context("Failed to open sinks")?;
    let mut broadcaster = FeatureBroadcaster::new(pool).spawn(
        config.tick_period,
        sinks,
        config.sinks.queue_depth,
        stats.clone(),
    );

    let mut source = match &input {
        Some(arg) => {
            let mut collector = ReplayCollector::new(ReplayConfig {
                source: ReplaySource::from_arg(arg),
                default_device: config.touch_device.clone(),
                realtime: true,
            });
            collector.start().context("Failed to start replay")?;
            println!("  Input: replay from {arg}");
            EventSource::Replay(collector)
        }
        None => {
            let mut collector = NoopCollector::new();
            collector.start().context("Failed to start collector")?;
            println!("  Input: none (idle)");
            EventSource::Idle(collector)
        }
    };

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let receiver = source.receiver();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                let outcome = router.handle(&event);
                debug!(id = event.id, kind = ?event.kind, ?outcome, "Routed event");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                println!("Input finished");
                break;
            }
        }
    }

    println!();
    println!("Shutting down...");
    source.stop();
    broadcaster.stop();

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_init_config(force: bool) -> anyhow::Result<()> {
    let path = Config::config_path();
    if path.exists() && !force {
        anyhow::bail!("{path:?} already exists (use --force to overwrite)");
    }

    Config::default()
        .save_to(&path)
        .context("Failed to write configuration")?;
    println!("Wrote default configuration to {path:?}");
    Ok(())
}

fn cmd_features(channels: Option<usize>) -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let channels = channels.unwrap_or(config.channels);

    println!("Positional stream ({} values)", 2 * channels);
    for channel in 0..channels {
        println!("  {:>3}  channel{}/x", 2 * channel, channel + 1);
        println!("  {:>3}  channel{}/y", 2 * channel + 1, channel + 1);
    }
    println!();
    println!(
        "Feature stream ({} values)",
        FEATURES_PER_CHANNEL * channels
    );
    for channel in 0..channels {
        for (offset, name) in FEATURE_NAMES.iter().enumerate() {
            println!(
                "  {:>3}  channel{}/{}",
                channel * FEATURES_PER_CHANNEL + offset,
                channel + 1,
                name
            );
        }
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
