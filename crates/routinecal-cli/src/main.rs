use std::path::PathBuf;

use clap::{Parser, Subcommand};
use routinecal_core::logging;

mod commands;

#[derive(Parser)]
#[command(name = "routinecal", version, about = "Sync workout routines to your calendar")]
struct Cli {
    /// Data directory (default: ~/.config/routinecal)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Use an in-memory calendar instead of Google Calendar
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile routines with the calendar
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Remove every calendar event of a routine
    Deactivate(commands::sync::DeactivateArgs),
    /// Mark a scheduled workout completed or incomplete
    Complete(commands::complete::CompleteArgs),
    /// Show the events a sync would create, without creating them
    Preview(commands::sync::PreviewArgs),
    /// List stored event mappings
    Mappings(commands::mappings::MappingsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Google Calendar credentials
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

fn main() {
    logging::init_with_level("warn");

    let cli = Cli::parse();
    let result = commands::Context::new(cli.data_dir, cli.offline).and_then(|ctx| match cli.command {
        Commands::Sync { action } => commands::sync::run(&ctx, action),
        Commands::Deactivate(args) => commands::sync::deactivate(&ctx, args),
        Commands::Complete(args) => commands::complete::run(&ctx, args),
        Commands::Preview(args) => commands::sync::preview(&ctx, args),
        Commands::Mappings(args) => commands::mappings::run(&ctx, args),
        Commands::Config { action } => commands::config::run(&ctx, action),
        Commands::Auth { action } => commands::auth::run(action),
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
