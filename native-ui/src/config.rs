//! Command-line arguments and the settings derived from them.

use clap::Parser;
use std::path::PathBuf;

use vs_panel::Interval;

/// Video Synchronizer - compare up to four videos frame by frame
#[derive(Parser, Debug)]
#[command(name = "video-synchronizer")]
#[command(about = "Compare up to four videos side by side with synchronized frame stepping")]
#[command(version)]
pub struct Args {
    /// Videos to open at start-up (only the first four are used)
    pub paths: Vec<PathBuf>,

    /// Frames to step per navigation command (1-9999)
    #[arg(short, long, default_value = "1")]
    pub interval: u32,

    /// Per-video frame cache budget in MB (0 = keep every decoded frame)
    #[arg(long, default_value = "0")]
    pub cache_mb: usize,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print metadata of PATHS as JSON and exit
    #[arg(long)]
    pub probe: bool,
}

/// Start-up configuration for the window.
#[derive(Clone, Debug)]
pub struct Settings {
    pub initial_paths: Vec<PathBuf>,
    pub interval: Interval,
    pub cache_mb: usize,
}

impl From<&Args> for Settings {
    fn from(args: &Args) -> Self {
        Self {
            initial_paths: args.paths.clone(),
            interval: Interval::new(args.interval),
            cache_mb: args.cache_mb,
        }
    }
}
