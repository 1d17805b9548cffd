use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shoebox::cli::{
    handle_backup_command, handle_category_command, handle_photo_command, handle_pin_command,
    BackupCommands, CategoryCommands, PhotoCommands, PinCommands,
};
use shoebox::config::{paths::ShoeboxPaths, settings::Settings};
use shoebox::storage::{initialize_storage, Storage};

#[derive(Parser)]
#[command(
    name = "shoebox",
    version,
    about = "Photo library organizer with portable backups",
    long_about = "Shoebox files photos into categories and moves the whole library \
                  between devices as a single backup archive."
)]
struct Cli {
    /// Data directory (defaults to the platform config directory)
    #[arg(long, global = true, env = "SHOEBOX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors and hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and default categories
    Init,

    /// Show current configuration and paths
    Config,

    /// Settings PIN
    #[command(subcommand)]
    Pin(PinCommands),

    /// Category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Photo management commands
    #[command(subcommand)]
    Photo(PhotoCommands),

    /// Backup, restore and retention
    #[command(subcommand)]
    Backup(BackupCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let paths = match cli.data_dir {
        Some(dir) => ShoeboxPaths::with_base_dir(dir),
        None => ShoeboxPaths::new()?,
    };

    let Some(command) = cli.command else {
        println!("Shoebox - photo library organizer");
        println!();
        println!("Run 'shoebox --help' for usage information.");
        println!("Run 'shoebox init' to create a library.");
        return Ok(());
    };

    match command {
        Commands::Init => {
            println!("Initializing Shoebox at: {}", paths.base_dir().display());
            initialize_storage(&paths)?;
            let mut settings = Settings::load_or_create(&paths)?;
            settings.setup_completed = true;
            settings.save(&paths)?;
            println!("Initialization complete!");
            println!();
            println!("Default categories: family, friends, pets, places");
            println!("Run 'shoebox category list' to see them.");
        }
        Commands::Config => {
            let settings = Settings::load_or_create(&paths)?;
            println!("Shoebox Configuration");
            println!("=====================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Photo directory:  {}", paths.photos_dir().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!();
            println!("Settings:");
            println!("  Theme:            {:?}", settings.theme);
            println!("  Grid columns:     {}", settings.grid_columns);
            println!("  PIN set:          {}", settings.has_pin());
            println!(
                "  Retention:        {} daily, {} monthly",
                settings.backup_retention.daily_count, settings.backup_retention.monthly_count
            );
        }
        Commands::Pin(cmd) => {
            require_initialized(&paths)?;
            handle_pin_command(&paths, cmd)?;
        }
        Commands::Category(cmd) => {
            require_initialized(&paths)?;
            let storage = Storage::open(paths)?;
            handle_category_command(&storage, cmd)?;
        }
        Commands::Photo(cmd) => {
            require_initialized(&paths)?;
            let storage = Storage::open(paths)?;
            handle_photo_command(&storage, cmd)?;
        }
        Commands::Backup(cmd) => {
            require_initialized(&paths)?;
            let settings = Settings::load_or_create(&paths)?;
            let storage = Storage::open(paths)?;
            handle_backup_command(&storage, &settings, cmd, cli.quiet)?;
        }
    }

    Ok(())
}

fn require_initialized(paths: &ShoeboxPaths) -> Result<()> {
    if !paths.is_initialized() {
        bail!(
            "No library at {}. Run 'shoebox init' first.",
            paths.base_dir().display()
        );
    }
    Ok(())
}

/// Initialize tracing with the requested verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
