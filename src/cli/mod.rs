use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clipper",
    about = "Highlight Clipper - Cut published highlight clips out of long videos",
    version,
    long_about = "Detects highlights in a long-form video with Gemini, extracts each highlight as a clip with ffmpeg, uploads the clips to S3-compatible storage and records which highlight produced which clip."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the highlight pipeline for one source and wait for the result
    Run {
        /// Source video: YouTube URL, direct video URL or local file
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Extra instruction for the highlight detector
        #[arg(short, long, value_name = "TEXT")]
        instruction: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Submit several sources as background runs and poll until all finish
    Batch {
        /// Source videos
        #[arg(value_name = "SOURCE", required = true)]
        sources: Vec<String>,

        /// Extra instruction for the highlight detector, applied to every source
        #[arg(short, long, value_name = "TEXT")]
        instruction: Option<String>,

        /// Seconds between status polls
        #[arg(long, default_value = "5")]
        poll_interval: u64,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },

    /// List source platforms that are fetched before clipping
    Sources,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full result as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
