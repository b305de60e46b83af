//! gympulse: drive a simulated exercise machine from the terminal
//!
//! Every command prints JSON lines to stdout.
//!
//! Run with: cargo run -- stream --machine rowing --duration 10

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use gympulse::{MachineKind, MachineProfile, SessionConfig, SessionController, StartOutcome};

#[derive(Parser)]
#[command(name = "gympulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Seed for reproducible readings
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Assumed body mass for calorie estimates
    #[arg(long, global = true, default_value_t = gympulse::calories::DEFAULT_BODY_MASS_KG)]
    body_mass: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the machine catalog
    Machines,
    /// Take one reading without streaming
    Demo,
    /// Stream a timed session, one snapshot per tick
    Stream {
        /// Machine kind, e.g. treadmill or free-weights
        #[arg(short, long)]
        machine: String,
        /// Session length in seconds
        #[arg(short, long, default_value_t = 60)]
        duration: u64,
        /// Tick length in milliseconds
        #[arg(long, default_value_t = 1000)]
        tick_ms: u64,
    },
}

#[derive(Serialize)]
struct CatalogEntry {
    machine: MachineKind,
    cyclic: bool,
    #[serde(flatten)]
    profile: MachineProfile,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = SessionConfig::default().with_body_mass(cli.body_mass);
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    match cli.command {
        Command::Machines => {
            let controller = SessionController::new(config);
            for (machine, profile) in controller.machines() {
                print_json(&CatalogEntry {
                    machine,
                    cyclic: machine.is_cyclic(),
                    profile,
                })?;
            }
        }
        Command::Demo => {
            let controller = SessionController::new(config);
            print_json(&controller.demo()?)?;
        }
        Command::Stream {
            machine,
            duration,
            tick_ms,
        } => {
            let config = config.with_tick_interval(Duration::from_millis(tick_ms));
            stream(SessionController::new(config), &machine, duration).await?;
        }
    }

    Ok(())
}

async fn stream(controller: SessionController, machine: &str, duration: u64) -> anyhow::Result<()> {
    let mut updates = controller.subscribe();
    let outcome = controller
        .start(machine, Some(duration))
        .with_context(|| format!("could not start a session on '{machine}'"))?;
    print_json(&outcome)?;
    if outcome == StartOutcome::AlreadyRunning {
        return Ok(());
    }

    let finished = controller.wait();
    tokio::pin!(finished);
    let mut stopping = false;

    loop {
        tokio::select! {
            _ = &mut finished => break,
            update = updates.recv() => match update {
                Ok(snapshot) => print_json(&snapshot)?,
                Err(RecvError::Lagged(skipped)) => info!("Skipped {} ticks", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                print_json(&controller.stop())?;
                stopping = true;
            }
        }
    }

    // Ticks published just before the worker exited.
    while let Ok(snapshot) = updates.try_recv() {
        print_json(&snapshot)?;
    }
    print_json(&controller.snapshot()?)?;
    Ok(())
}
