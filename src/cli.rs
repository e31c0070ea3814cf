use clap::Parser;
use std::path::PathBuf;

/// Lighting and effects daemon for Razer peripherals
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: searched in RAZERD_CONFIG, ~/.config, /etc)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal after start-up
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Log debug messages
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,
}
