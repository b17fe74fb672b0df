use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate an .xlsx or .docx file
    Translate {
        /// Input document
        #[arg(short, long)]
        input: PathBuf,

        /// Target language, e.g. "Japanese" (defaults to the configured one)
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Extra instruction for the translator
        #[arg(long)]
        instruction: Option<String>,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List the distinct translatable strings of a document
    Extract {
        /// Input document
        #[arg(short, long)]
        input: PathBuf,

        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Remove abandoned working files
    Sweep {
        /// Age in hours (defaults to the configured one)
        #[arg(long)]
        hours: Option<u64>,
    },
}
