mod absorbing;
mod analysis;
mod capital;
mod chain;
mod config;
mod engine;
mod linalg;
mod manager;
mod model;
mod network;
mod stationary;
mod stats;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate the daily life-state chain with and without perturbation.
    Chain,

    /// Track convergence of the identity-interpolation chain.
    Converge,

    /// Analyze path dependence under effort, risk and lock-in.
    Path,

    /// Solve the capital dynamics and run Monte Carlo paths.
    Wealth,

    /// Grow a preferential-attachment network and lay it out.
    Network,

    /// Edit one probability of the chain matrix.
    Edit {
        #[arg(long)]
        row: usize,

        #[arg(long)]
        col: usize,

        #[arg(long)]
        value: f64,
    },

    All,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mut mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Chain => mgr.run_chain()?,
        Command::Converge => mgr.run_convergence()?,
        Command::Path => mgr.run_path()?,
        Command::Wealth => mgr.run_wealth()?,
        Command::Network => mgr.run_network()?,
        Command::Edit { row, col, value } => mgr.edit_matrix(row, col, value)?,
        Command::All => mgr.run_all()?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
