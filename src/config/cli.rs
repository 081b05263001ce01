// Command-line interface
// Flags override the config file and environment

use clap::Parser;
use std::path::PathBuf;

/// Serve a directory over HTTP: GET streams a subtree as tar, POST stores a file
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The address to listen on
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// The directory to store files into (a temporary directory when empty)
    #[arg(short, long, value_name = "DIR")]
    pub directory: Option<String>,

    /// Path to config file (without extension is fine)
    #[arg(short, long, value_name = "FILE", default_value = "tarserve")]
    pub config: PathBuf,
}
