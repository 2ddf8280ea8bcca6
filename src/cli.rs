use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webm-remux")]
#[command(author, version, about = "Remux WebM recordings into seekable, indexed WebM files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remux a WebM file, adding cues, duration and exact sizes
    Remux {
        /// Input file to remux
        #[arg(required = true)]
        input: PathBuf,

        /// Where to write the result
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Only measure the output size; write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe a WebM/Matroska file and display its structure
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
