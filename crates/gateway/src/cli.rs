//! Command-line interface for the `medflow` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mf_domain::config::{Config, ConfigSeverity};
use mf_domain::error::Result;

#[derive(Debug, Parser)]
#[command(name = "medflow", about = "Medical-information assistant backend")]
pub struct Cli {
    /// Path to config.toml (environment variables override it).
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (the default).
    Serve,
    /// Validate the configuration and exit.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print the version and exit.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Validate,
}

/// Load the config file (when present) plus the environment overlay.
pub fn load_config(cli: &Cli) -> Result<Config> {
    Config::load(Some(&cli.config))
}

/// Print validation issues; returns false when any is an error.
pub fn validate(config: &Config) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("configuration OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}
