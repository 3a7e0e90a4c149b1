//! Command-line interface

use clap::Parser;

use super::constants::APP_NAME;

/// CLI flags; anything not given here falls back to environment variables
/// and built-in defaults (see `config`).
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "tracegate", about = APP_NAME, version)]
pub struct CliConfig {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(long)]
    pub port: Option<u16>,
}

pub fn parse() -> CliConfig {
    CliConfig::parse()
}
