use clap::Parser;
use std::path::PathBuf;

/// rgb-fand — daemon for fan speed and RGB lighting control
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: search standard locations)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Run as a background daemon
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Enable debug logging and the periodic diagnostics dump
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,
}
