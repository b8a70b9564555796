use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use env_logger::Env;
use image::RgbImage;
use log::{debug, error, info, warn, LevelFilter};
use overlens_camera::{spawn_analyzer, CameraError, FrameSource, LatestSlot, YuvFrame};
use overlens_detect::{AnalysisResult, ImageAnalyzer, InferencePipeline, ReplayPipeline, Task};
use overlens_overlay::{
    compose_preview, render_overlays, DetectionSlot, Overlay, OverlayStyle, PreviewBounds,
    ScaleMode,
};
use overlens_preprocess::{frame_to_nv21, nv21_to_rgb, rotate};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

mod config;
mod tracker;

use config::ClientConfig;
use tracker::MarkerTracker;

// ================ PIPELINE STAGES ================== //

/// 0) Parse CLI arguments
#[derive(Parser, Debug)]
#[command(name = "overlens", about = "Render detection overlays onto a synthetic camera feed")]
struct CliArgs {
    /// JSON run configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving frame_00000.png, frame_00001.png, ...
    #[arg(long, default_value = "overlens-out")]
    output: PathBuf,

    /// Frames to capture (0 = until Ctrl-C).
    #[arg(long)]
    frames: Option<u64>,

    #[arg(long)]
    view_width: Option<u32>,

    #[arg(long)]
    view_height: Option<u32>,

    /// fill | fit
    #[arg(long)]
    scale_mode: Option<ScaleMode>,

    /// Mirror the preview, as for a front-facing camera.
    #[arg(long)]
    mirrored: bool,

    /// Recorded predictions (JSON array) to replay instead of tracking the marker.
    #[arg(long)]
    detections: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

impl CliArgs {
    fn apply(&self, cfg: &mut ClientConfig) {
        if let Some(frames) = self.frames {
            cfg.frames = frames;
        }
        if let Some(w) = self.view_width {
            cfg.overlay.view_width = w;
        }
        if let Some(h) = self.view_height {
            cfg.overlay.view_height = h;
        }
        if let Some(mode) = self.scale_mode {
            cfg.overlay.scale_mode = mode;
        }
        cfg.overlay.mirrored |= self.mirrored;
    }
}

/// Honours `RUST_LOG`, falling back to `default_level`.
fn init_logging(default_level: LevelFilter) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()))
        .format_timestamp_millis()
        .try_init();
}

/// 1) Choose what the analysis thread runs
fn build_pipeline(cfg: &ClientConfig, detections: Option<&Path>) -> Result<Box<dyn InferencePipeline>> {
    match detections {
        Some(path) => {
            let replay = ReplayPipeline::from_json_file("replay", Task::Detection, path)
                .with_context(|| format!("loading detections from {}", path.display()))?;
            info!("replaying {} recorded predictions from {}", replay.len(), path.display());
            Ok(Box::new(replay))
        }
        None => Ok(Box::new(MarkerTracker::new(cfg.camera.build(0)?))),
    }
}

/// 2) Upright RGB preview of a captured frame
fn frame_rgb(frame: &YuvFrame) -> Result<RgbImage> {
    let nv21 = frame_to_nv21(frame)
        .with_context(|| format!("converting frame #{}", frame.sequence))?;
    Ok(rotate(nv21_to_rgb(&nv21)?, frame.rotation_degrees)?)
}

/// 3) Compose the preview and draw the latest published detection
fn render_frame(
    rgb: &RgbImage,
    latest: Option<&AnalysisResult>,
    cfg: &ClientConfig,
    style: &OverlayStyle,
) -> Option<RgbImage> {
    let ov = &cfg.overlay;
    let bounds = PreviewBounds::compute(
        rgb.width(),
        rgb.height(),
        ov.view_width,
        ov.view_height,
        ov.scale_mode,
        ov.mirrored,
    )?;
    let mut canvas = compose_preview(rgb, &bounds, style);

    if let Some(result) = latest {
        let overlays = ov.mapper().map(result);
        for o in &overlays {
            if let Overlay::Caption { text } = o {
                info!("{text}");
            }
        }
        let drawn = render_overlays(&mut canvas, &overlays, style);
        debug!(
            "{} ({drawn} primitives, analyzed in {:?})",
            result.prediction.text(),
            result.process_time
        );
    }
    Some(canvas)
}

/// 4) Persist rendered frames off the render loop
fn writer_thread(rx: Receiver<(u64, RgbImage)>, dir: PathBuf) -> usize {
    let mut written = 0;
    for (index, image) in rx {
        let path = dir.join(format!("frame_{index:05}.png"));
        match image.save(&path) {
            Ok(()) => written += 1,
            Err(e) => error!("failed to write {}: {e}", path.display()),
        }
    }
    written
}

// ================ MAIN ================== //

fn run(cfg: &ClientConfig, output: &Path, detections: Option<&Path>) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let mut camera = cfg.camera.build(cfg.frames)?;
    let mut analyzer = ImageAnalyzer::new(vec![build_pipeline(cfg, detections)?]);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    // Analysis thread: newest frame only, publishes immutable snapshots.
    let frames: Arc<LatestSlot<YuvFrame>> = Arc::new(LatestSlot::new());
    let detections_slot: Arc<DetectionSlot<AnalysisResult>> = Arc::new(DetectionSlot::new());
    let mirrored = cfg.overlay.mirrored;
    let analyzer_handle = {
        let slot = Arc::clone(&detections_slot);
        spawn_analyzer(Arc::clone(&frames), move |frame: YuvFrame| {
            match analyzer.analyze(&frame, mirrored) {
                Ok(Some(result)) => {
                    slot.publish(result);
                }
                Ok(None) => {
                    slot.clear();
                }
                Err(e) => warn!("analysis of frame #{} failed: {e}", frame.sequence),
            }
        })
        .context("spawning analyzer thread")?
    };

    let (tx_png, rx_png) = bounded::<(u64, RgbImage)>(4);
    let writer = {
        let dir = output.to_path_buf();
        thread::Builder::new()
            .name("overlens-writer".into())
            .spawn(move || writer_thread(rx_png, dir))
            .context("spawning writer thread")?
    };

    let style = OverlayStyle::default();
    let mut rendered = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let frame = match camera.next_frame_blocking() {
            Ok(f) => f,
            Err(CameraError::EndOfStream) => break,
            Err(e) => return Err(e.into()),
        };

        let rgb = frame_rgb(&frame)?;
        frames.offer(frame);

        let latest = detections_slot.load();
        let Some(canvas) = render_frame(&rgb, latest.as_deref(), cfg, &style) else {
            warn!("view is {}x{}, nothing to draw", cfg.overlay.view_width, cfg.overlay.view_height);
            continue;
        };
        if tx_png.send((rendered, canvas)).is_err() {
            error!("writer thread went away");
            break;
        }
        rendered += 1;
    }

    // Cleanup
    frames.close();
    if analyzer_handle.join().is_err() {
        error!("analyzer thread panicked");
    }
    drop(tx_png);
    let written = writer.join().map_err(|_| anyhow::anyhow!("writer thread panicked"))?;

    info!(
        "rendered {rendered} frames, wrote {written} to {}, analyzer skipped {}",
        output.display(),
        frames.dropped()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info });

    let mut cfg = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    args.apply(&mut cfg);
    debug!("{cfg:?}");

    run(&cfg, &args.output, args.detections.as_deref())
}
