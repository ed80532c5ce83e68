use anyhow::Result;
use tracing::{error, info};

mod cli;
mod crawler;
mod fetch;
mod storage;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first; logging flags are global
    let args = cli::parse_args();

    // Initialize logging
    utils::logging::init_logging(args.verbose(), args.log_file())?;

    info!("Starting News Harvester v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e)
        }
    }
}
