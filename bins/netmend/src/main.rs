//! netmend command - watch network connectivity and repair it.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use netmend::monitor::Config;

#[derive(Parser)]
#[command(name = "netmend", version, about = "Network connectivity monitor and repair tool")]
struct Cli {
    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Configuration file (JSON).
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug output from the monitor.
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor connectivity and repair failures until interrupted.
    #[command(visible_alias = "w")]
    Watch(commands::watch::WatchCmd),

    /// Show the current path, its classification and settings.
    #[command(visible_alias = "s")]
    Status(commands::status::StatusCmd),

    /// Run the repair procedure once.
    #[command(visible_alias = "r")]
    Repair(commands::repair::RepairCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose {
        filter = filter.add_directive("netmend=debug".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => Config::default(),
    };

    let result = match cli.command {
        Command::Watch(cmd) => cmd.run(config, cli.json).await,
        Command::Status(cmd) => cmd.run(config, cli.json).await,
        Command::Repair(cmd) => cmd.run(config, cli.json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
