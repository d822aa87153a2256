//! Funzl CLI - Buzzer Song Toolkit
//!
//! Command-line interface for importing, scheduling and uploading songs.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::debug;

use funzl::cli::{commands, Cli, Commands};
use funzl::config::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("Funzl v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings: {}", cli.config.display()))?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &settings),
        None => {
            println!("Funzl v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, settings: &Settings) -> Result<()> {
    debug!("Running {:?}", cmd);
    match cmd {
        Commands::Import {
            input,
            output,
            schedule,
        } => commands::import(&input, &output, schedule),
        Commands::Info { path, buzzer } => commands::show_info(&path, buzzer),
        Commands::Conflicts { path } => commands::show_conflicts(&path),
        Commands::FixOverlaps { path } => commands::fix_overlaps(&path),
        Commands::AutoAssign { path } => commands::auto_assign(&path),
        Commands::Export { path, output } => commands::export(&path, output.as_deref(), settings),
        Commands::Send {
            path,
            buzzer,
            start,
        } => commands::send(&path, buzzer, start, settings),
        Commands::Stop => commands::stop(settings),
    }
}
