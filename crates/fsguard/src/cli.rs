//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// fsguard - Filesystem operations with admission control and retries
#[derive(Parser, Debug)]
#[command(name = "fsguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to an fsguard.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Override the number of operations allowed in flight
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a file to stdout
    Read(PathArgs),

    /// Write text to a file
    Write(WriteArgs),

    /// Create a directory and its parents
    Mkdir(PathArgs),

    /// Remove a file or directory tree
    Remove(PathArgs),

    /// Copy a file or directory tree
    Copy(TransferArgs),

    /// Move a file or directory
    Move(TransferArgs),

    /// Report whether a path exists
    Exists(PathArgs),

    /// Create a file, and its parents, if missing
    EnsureFile(PathArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Target path
    pub path: Utf8PathBuf,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// File to write
    pub path: Utf8PathBuf,

    /// Text to write
    pub content: String,

    /// Append instead of replacing the file
    #[arg(short, long)]
    pub append: bool,

    /// Parse the content as JSON and write it pretty-printed
    #[arg(long, conflicts_with = "append")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Source path
    pub src: Utf8PathBuf,

    /// Destination path
    pub dest: Utf8PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Print the config file location
    Path,
}
