//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// readthrough - versioned read-through HTTP response cache
///
/// Precaches a manifest of resources, purges caches left over from older
/// versions, and serves requests from cache before the network.
#[derive(Parser, Debug)]
#[command(name = "readthrough")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "READTHROUGH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Precache the manifest into the current cache version
    Install,

    /// Delete caches from other versions and start serving
    Activate,

    /// Install and activate, then optionally serve URLs
    Up(UpArgs),

    /// Serve requests from cache, falling back to the network
    Fetch(FetchArgs),

    /// List physical caches in storage
    Caches(CachesArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URLs or paths to request
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header (name:value), may be repeated
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Write response bodies to stdout
    #[arg(long)]
    pub body: bool,
}

/// Arguments for the up command
#[derive(Parser, Debug)]
pub struct UpArgs {
    /// URLs or paths to serve once activated
    pub urls: Vec<String>,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the caches command
#[derive(Parser, Debug)]
pub struct CachesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.version)
        key: String,
        /// Value to set
        value: String,
    },
}
