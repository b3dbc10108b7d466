use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::storage;

pub mod commands;

use self::commands::{EditArgs, LsArgs, NewArgs, ProfileArgs, RmArgs, TreeArgs};

#[derive(Parser, Debug)]
#[command(
    name = "grove",
    version,
    about = "Keyboard-first terminal knowledge base with folder hierarchies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over GROVE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over GROVE_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Profile to operate on (defaults to the configured profile)
    #[arg(long)]
    pub profile: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Create a new note from the command line
    New(NewArgs),
    /// List the folders and notes directly under a path
    Ls(LsArgs),
    /// Print the full folder tree
    Tree(TreeArgs),
    /// Update a note's title or content
    Edit(EditArgs),
    /// Delete a note permanently
    Rm(RmArgs),
    /// Manage profiles
    Profile(ProfileArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("GROVE_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("GROVE_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;

    let profile_name = cli.profile.clone().unwrap_or_else(|| config.profile.clone());
    let profile = storage.ensure_profile(&profile_name)?;

    let config = Arc::new(config);
    let command = cli.command.unwrap_or(Commands::Tui);
    match command {
        Commands::Tui => {
            let mut app = App::new(config, storage, profile)?;
            commands::run_tui(&mut app)
        }
        Commands::New(args) => commands::new_note(config, storage, &profile.id, args),
        Commands::Ls(args) => commands::list_folder(config, storage, &profile.id, args),
        Commands::Tree(args) => commands::print_tree(config, storage, &profile.id, args),
        Commands::Edit(args) => commands::edit_note(storage, &profile.id, args),
        Commands::Rm(args) => commands::remove_note(config, storage, &profile.id, args),
        Commands::Profile(args) => commands::handle_profile_command(storage, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
