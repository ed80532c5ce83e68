pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file (defaults to the data directory when
    /// --log-to-file is set without a path)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Also write logs to the default log file
    #[arg(long, global = true)]
    log_to_file: bool,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(|| {
            self.log_to_file
                .then(crate::utils::logging::default_log_file)
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run crawl workers for one or more newspapers, forever
    Run {
        /// Newspaper ids to crawl (one worker per newspaper)
        #[arg(required = true)]
        newspapers: Vec<String>,

        /// Configuration profile to use instead of the default
        #[arg(short, long)]
        profile: Option<String>,

        /// Override the minimum delay between network requests (ms)
        #[arg(short, long)]
        min_delay: Option<u64>,
    },

    /// Upsert the configured sources into the catalog
    Sync {
        /// Configuration profile to use instead of the default
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show article counts for a newspaper
    Status {
        /// Newspaper id to report on
        #[arg(required = true)]
        newspaper: String,

        /// Configuration profile to use instead of the default
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            newspapers,
            profile,
            min_delay,
        } => {
            info!("Starting crawl workers for: {}", newspapers.join(", "));
            commands::run(newspapers, profile, min_delay).await
        }
        Commands::Sync { profile } => {
            info!("Syncing configured sources into the catalog");
            commands::sync(profile).await
        }
        Commands::Status { newspaper, profile } => {
            info!("Checking status for newspaper {}", newspaper);
            commands::status(newspaper, profile).await
        }
        Commands::Config { profile, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if let Some(profile_name) = profile {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(profile_name)
            } else {
                info!("Showing current configuration");
                commands::show_config()
            }
        }
    }
}
