//! Toonify CLI - remove an image's background and turn the cutout into a cartoon.
//!
//! Toonify takes a photo (HEIC/HEIF photos are converted to JPEG first),
//! strips its background with a local segmentation command, and sends the
//! cutout to a cartoonization service. Both results can be saved as PNG.
//!
//! # Usage
//!
//! ```bash
//! # Remove the background from one image
//! toonify run portrait.heic
//!
//! # Remove the background and cartoonize the result
//! toonify run portrait.jpg --cartoon --output-dir ~/Pictures
//!
//! # Menu-driven session (also the default on a terminal)
//! toonify session
//!
//! # View configuration
//! toonify config show
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;

mod cli;
mod logging;

/// Toonify - background removal and cartoonization for single images.
#[derive(Parser, Debug)]
#[command(name = "toonify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline on one image and save the results
    Run(cli::run::RunArgs),

    /// Start an interactive session
    Session,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match toonify_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `toonify config path`."
            );
            toonify_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Toonify v{}", toonify_core::VERSION);

    match cli.command {
        Some(Commands::Run(args)) => cli::run::execute(args, config).await,
        Some(Commands::Session) => cli::session::run(config).await,
        Some(Commands::Config(args)) => cli::config::execute(args).await,
        None if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() => {
            cli::session::run(config).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
