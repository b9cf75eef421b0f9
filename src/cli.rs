use clap::{Parser, Subcommand};
use shrinkray_common::{Codec, Container};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shrinkray")]
#[command(author, version, about = "Transcode media files to a target size")]
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
    /// Transcode a file to approximately the given size
    Compress {
        /// Input file to transcode
        #[arg(required = true)]
        input: PathBuf,

        /// Target size in whole megabytes
        #[arg(short, long)]
        size: String,

        /// Video codec: h264, h265, vp9 or av1 (default from config)
        #[arg(long)]
        codec: Option<Codec>,

        /// Output container: mp4, mkv, mov or webm (default from config)
        #[arg(long)]
        container: Option<Container>,

        /// Print job events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Probe a file and show the bitrate a target size would use
    Plan {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Target size in whole megabytes
        #[arg(short, long)]
        size: String,

        /// Output container (default from config)
        #[arg(long)]
        container: Option<Container>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the duration and size of a media file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
