//! CLI command implementations.

pub mod catalog;
pub mod config;
pub mod demo;
pub mod run;

use clap::{Args, Subcommand};

/// Arguments for the demo command.
#[derive(Args)]
pub struct DemoArgs {
    /// Run a single scenario (1-5).
    #[arg(short, long)]
    pub scenario: Option<usize>,

    /// Simulated backend latency in milliseconds.
    #[arg(long, default_value_t = 150)]
    pub latency_ms: u64,
}

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Script file, one command per line. Use `-` for stdin.
    pub script: String,

    /// Simulated backend latency in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub latency_ms: u64,

    /// Product ids the backend rejects.
    #[arg(long, value_delimiter = ',')]
    pub reject: Vec<String>,

    /// Stop at the first failing command.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the catalog command.
#[derive(Args)]
pub struct CatalogArgs {
    /// Show savings on discounted products.
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file without asking.
        #[arg(short, long)]
        force: bool,

        /// Output file (default: cart.toml).
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate the configuration.
    Validate,
}
