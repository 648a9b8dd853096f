// CLI module for sitegate
// Author: kelexine (https://github.com/kelexine)

use clap::Parser;

/// sitegate - authenticated backend proxy for the marketing site
#[derive(Parser, Debug)]
#[command(name = "sitegate", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (defaults to ~/.sitegate/config.toml)
    #[arg(short, long, env = "SITEGATE_CONFIG")]
    pub config: Option<String>,

    /// Override the bind address from the config file
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port from the config file
    #[arg(short, long)]
    pub port: Option<u16>,
}
