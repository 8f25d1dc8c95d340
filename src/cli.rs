use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{MAX_MAX_TOKENS, MIN_MAX_TOKENS};

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
    /// Analyze a single .srt file for transcription errors
    Analyze {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the correction report
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum tokens per chunk
        #[arg(long, value_parser = clap::value_parser!(u32).range((MIN_MAX_TOKENS as i64)..=(MAX_MAX_TOKENS as i64)))]
        max_tokens: Option<u32>,
    },

    /// Analyze every .srt file in a directory
    Batch {
        /// Input directory containing subtitle files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory for the correction reports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum tokens per chunk
        #[arg(long, value_parser = clap::value_parser!(u32).range((MIN_MAX_TOKENS as i64)..=(MAX_MAX_TOKENS as i64)))]
        max_tokens: Option<u32>,
    },

    /// Browse or edit the analysis history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Write a default config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List analyzed files
    List,

    /// Print the report of a history entry
    Show {
        /// Entry index as shown by `history list`
        index: usize,
    },

    /// Remove a history entry
    Delete {
        /// Entry index as shown by `history list`
        index: usize,
    },
}
