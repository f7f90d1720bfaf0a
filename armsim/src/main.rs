//! # armsim - arm simulation runner
//!
//! Usage:
//!   armsim run --target 0,90,0,0 --steps 50      # Engine + one commanded motion
//!   armsim run --viz 127.0.0.1:5003             # Stream frames to a visualizer
//!   armsim rollout --envs 4 --epochs 10         # Random-action rollouts
//!   armsim listen --port 5003                   # Receive and log frames
//!
//! Log verbosity follows `RUST_LOG` (default `armsim=info,armsim_core=info`).

mod commands;

use anyhow::{Context, Result};
use armsim_core::{JointAngles, SimConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "armsim")]
#[command(about = "Kinematic arm simulation with objective tracking")]
#[command(version = "0.1.0")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the threaded engine
    Run(RunArgs),
    /// Random-action rollouts over several environments
    Rollout(RolloutArgs),
    /// Receive visualization frames and log them
    Listen(ListenArgs),
}

/// Where the simulation configuration comes from
#[derive(Args, Clone)]
pub struct ConfigArgs {
    /// Configuration file (TOML); overrides --preset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in configuration: compact (R=51.3) or extended (R=55.6)
    #[arg(long, default_value = "compact")]
    preset: String,

    /// RNG seed for reproducible objectives and actions
    #[arg(long)]
    seed: Option<u64>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => SimConfig::preset(&self.preset)?,
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        Ok(config)
    }
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(short, long, value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Joint-angle target in degrees, e.g. 0,90,0,0
    #[arg(long, value_parser = parse_angles, allow_hyphen_values = true)]
    target: Option<JointAngles>,

    /// Interpolation steps for --target
    #[arg(long, default_value = "300")]
    steps: usize,

    /// Visualizer address (HOST:PORT)
    #[arg(long)]
    viz: Option<String>,
}

#[derive(Args)]
pub struct RolloutArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Number of environments
    #[arg(short = 'n', long, default_value = "5")]
    envs: usize,

    /// Episodes per environment
    #[arg(short, long, default_value = "10")]
    epochs: usize,

    /// Step budget per episode (overrides the config)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Exact objective count per batch (overrides the config range)
    #[arg(long)]
    objectives: Option<usize>,

    /// Visualizer address (HOST:PORT)
    #[arg(long)]
    viz: Option<String>,

    /// Pause between rendered steps, in milliseconds
    #[arg(long, default_value = "0")]
    render_interval_ms: u64,
}

#[derive(Args)]
pub struct ListenArgs {
    /// UDP port to listen on
    #[arg(short, long, default_value = "5003")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

fn parse_angles(text: &str) -> Result<JointAngles, String> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid angle: {}", e))?;
    let angles: [f64; 4] = values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected 4 angles, got {}", v.len()))?;
    Ok(JointAngles::new(angles))
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let secs = text
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid duration: {}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {}: {}", secs, e))
}

/// Flag cleared by Ctrl+C
pub fn install_interrupt_flag() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nCtrl+C received, shutting down...");
        flag.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("failed to set signal handler: {}", e);
    }
    running
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "armsim=info,armsim_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Rollout(args) => commands::rollout::execute(args),
        Commands::Listen(args) => commands::listen::execute(args),
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
    fn test_parse_angles() {
        assert_eq!(
            parse_angles("0, 90,-45.5,0").unwrap(),
            JointAngles::new([0.0, 90.0, -45.5, 0.0])
        );
        assert!(parse_angles("1,2,3").is_err());
        assert!(parse_angles("a,b,c,d").is_err());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "armsim", "run", "--preset", "extended", "--target", "0,355,0,0", "--steps", "10",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.steps, 10);
        assert_eq!(args.target, Some(JointAngles::new([0.0, 355.0, 0.0, 0.0])));
        assert_eq!(args.config.load().unwrap().workspace.radius, 55.6);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("2.5").unwrap(), Duration::from_millis(2500));
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("NaN").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("1e300").is_err());
        assert!(Cli::try_parse_from(["armsim", "run", "--duration", "inf"]).is_err());
    }

    #[test]
    fn test_unknown_preset() {
        let cli = Cli::try_parse_from(["armsim", "rollout", "--preset", "huge"]).unwrap();
        let Commands::Rollout(args) = cli.command else {
            panic!("expected rollout");
        };
        assert!(args.config.load().is_err());
    }
}
