mod app;
mod config;
mod controls;
mod panel_view;
mod theme;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::VideoSyncApp;
use config::{Args, Settings};

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if args.probe {
        return probe(&args.paths);
    }

    vs_decoder::init().map_err(|e| anyhow!("FFmpeg initialisation failed: {e}"))?;

    tracing::info!("Video Synchronizer starting...");

    let settings = Settings::from(&args);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Video Synchronizer")
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Video Synchronizer",
        options,
        Box::new(move |cc| {
            theme::apply_theme(&cc.egui_ctx);
            Ok(Box::new(VideoSyncApp::new(&cc.egui_ctx, settings)))
        }),
    )
    .map_err(|e| anyhow!("failed to start the window: {e}"))
}

/// `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Print metadata for each path as JSON and exit without opening a window.
fn probe(paths: &[std::path::PathBuf]) -> Result<()> {
    use vs_common::FrameSource;

    let mut found = Vec::new();
    let mut failed = 0usize;

    for path in paths {
        match vs_decoder::FfmpegSource::open(path) {
            Ok(source) => found.push(source.metadata().clone()),
            Err(e) => {
                eprintln!("{e}");
                failed += 1;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&found)?);

    if failed > 0 {
        anyhow::bail!("{failed} file(s) could not be opened");
    }
    Ok(())
}
