//! Parses the command line arguments.
//!
//! Basic usage for running a built-in simulation with logging on:
//!
//! ```text
//! cargo run -- --simulation router_cycle --log
//! ```
//!
//! Engine parameters can be read from a TOML file with `--config`.

use crate::simulations::{self, SimulationError};
use clap::Parser;
use cyst_core::{
    environment::EnvironmentError, store::MemoryDataStore, Environment, EnvironmentConfig,
};
use std::{
    fs::{create_dir_all, OpenOptions},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing_subscriber::FmtSubscriber;

/// Stores the different command line arguments.
#[derive(Parser)]
struct Args {
    /// Logging flag. Used to turn logging on or off.
    #[arg(short, long)]
    log: bool,
    /// Name of the built-in simulation to run
    #[arg(short, long)]
    simulation: String,
    /// TOML file with engine parameters
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Unknown simulation '{0}', expected one of: {1}")]
    UnknownSimulation(String, String),
    #[error("Cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Cannot install the log subscriber: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Parses command line arguments and runs the requested simulation.
pub fn parse_args() -> Result<(), CliError> {
    let cli = Args::parse();
    if cli.log {
        initialize_logging()?;
    }
    let config = match cli.config {
        Some(path) => load_config(&path)?,
        None => EnvironmentConfig::default(),
    };
    let (env, store) = run_simulation(&cli.simulation, config)?;
    print_summary(&cli.simulation, &env, &store);
    Ok(())
}

/// Runs a built-in simulation and commits its results into a fresh store.
pub fn run_simulation(
    name: &str,
    config: EnvironmentConfig,
) -> Result<(Environment, MemoryDataStore), CliError> {
    let simulation = simulations::find(name).ok_or_else(|| {
        let known: Vec<&str> = simulations::SIMULATIONS.iter().map(|(name, _)| *name).collect();
        CliError::UnknownSimulation(name.to_string(), known.join(", "))
    })?;
    let mut env = simulation(config)?;
    let mut store = MemoryDataStore::new();
    env.commit(&mut store)?;
    Ok((env, store))
}

pub fn load_config(path: &Path) -> Result<EnvironmentConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

/// Missing keys keep their default values.
pub fn parse_config(text: &str) -> Result<EnvironmentConfig, CliError> {
    Ok(toml::from_str(text)?)
}

fn print_summary(name: &str, env: &Environment, store: &MemoryDataStore) {
    println!("{}: {} at virtual time {}", name, env.state(), env.current_time());
    for record in store.messages() {
        let detail = match (&record.action, &record.status) {
            (Some(action), _) => action.clone(),
            (None, Some(status)) => format!("{} {}", status, record.content.as_deref().unwrap_or("")),
            (None, None) => String::new(),
        };
        println!(
            "{:>6} {:<12} {:<8} #{:<4} {}",
            record.time, record.node, record.kind, record.id, detail
        );
    }
    for statistics in store.statistics() {
        println!(
            "run {}: {} messages in virtual time {}..{}",
            statistics.run_id,
            statistics.messages,
            statistics.start_time_virtual,
            statistics.end_time_virtual
        );
    }
}

/// Initializes the event protocol. Only should be called once when the sim starts.
/// Writes every event as a JSON line to a timestamped file in ./logs.
fn initialize_logging() -> Result<(), CliError> {
    let main_path = "./logs";
    let io_error = |path: &str| {
        let path = path.to_string();
        move |source: std::io::Error| CliError::Io { path, source }
    };
    create_dir_all(main_path).map_err(io_error(main_path))?;
    let file_path = format!(
        "{}/debug-{}.log",
        main_path,
        chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
    );
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&file_path)
        .map_err(io_error(&file_path))?;
    let subscriber = FmtSubscriber::builder()
        .with_writer(Arc::new(file))
        .with_max_level(tracing::Level::TRACE)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
