//! Barcony CLI - builds and serves the Barcony website.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "barcony")]
#[command(about = "Build and serve the Barcony website")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to barcony.toml config file
    #[arg(short, long, default_value = "barcony.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inject shared components into every page
    Build {
        /// Output directory (defaults to config or the site directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip CSS minification
        #[arg(long)]
        no_minify: bool,
    },

    /// Remove duplicated and legacy inline scripts
    Clean {
        /// Files to clean (defaults to the configured pages)
        files: Vec<PathBuf>,
    },

    /// Serve the site and the contact endpoint
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Serve and rebuild when components change
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "7777")]
        port: u16,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load(&cli.config)?;

    match cli.command {
        Commands::Build { output, no_minify } => {
            let minify = if no_minify { Some(false) } else { None };
            commands::build::run(&config, output, minify).await?;
        }
        Commands::Clean { files } => {
            commands::clean::run(&config, files)?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(&config, port, dir, !no_open).await?;
        }
        Commands::Dev { port } => {
            commands::dev::run(&config, port).await?;
        }
    }

    Ok(())
}
