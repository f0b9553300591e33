use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use blinkwatch_core::capture::domain::video_capture::VideoCapture;
use blinkwatch_core::capture::domain::video_source::VideoSource;
use blinkwatch_core::detection::domain::detection_strategy::StrategyKind;
use blinkwatch_core::detection::infrastructure::strategy_factory::create_strategy;
use blinkwatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use blinkwatch_core::pipeline::track_eyes_use_case::TrackEyesUseCase;
use blinkwatch_core::scheduler::infrastructure::png_preview_sink::PngPreviewSink;
use blinkwatch_core::scheduler::worker_scheduler::ExecutionMode;
use blinkwatch_core::shared::asset_resolver::AssetResolver;
use blinkwatch_core::shared::settings::TrackerSettings;

/// Host loop period; roughly one consumer frame at 30 fps.
const HOST_FRAME: Duration = Duration::from_millis(33);

/// Frames between two pipeline summary lines.
const REPORT_EVERY: usize = 300;

#[derive(Parser)]
#[command(name = "blinkwatch", about = "Watch a camera or video file and report blinks and winks")]
struct Cli {
    /// Camera index to open.
    #[arg(long, conflicts_with = "file")]
    camera: Option<u32>,

    /// Video file to read instead of a camera.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Face/eye detection strategy: cascade, dnn or hybrid.
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Seconds between capture reads.
    #[arg(long)]
    refresh_rate: Option<f64>,

    /// Seconds between detection passes.
    #[arg(long)]
    detect_rate: Option<f64>,

    /// Resize captured frames, e.g. 1280x720.
    #[arg(long, value_parser = parse_resize)]
    resize: Option<(u32, u32)>,

    /// Directory holding the cascade and model files.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Download missing assets into the user cache directory.
    #[arg(long)]
    download_assets: bool,

    /// Settings file (defaults to the per-user settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the latest captured and annotated frames as PNGs into this directory.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Drive capture and detection from the main loop instead of worker threads.
    #[arg(long)]
    single_threaded: bool,

    /// Stop after this many seconds (runs until Ctrl-C otherwise).
    #[arg(long)]
    duration: Option<f64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = build_settings(&cli)?;

    let resolver = build_resolver(&settings);
    log::info!("Building {} detection strategy", settings.detection.strategy);
    let strategy = create_strategy(&settings.detection, &resolver)?;
    if settings.assets.download {
        eprintln!();
    }

    let mode = if cli.single_threaded {
        ExecutionMode::Cooperative
    } else {
        ExecutionMode::detect()
    };
    let mut tracker = TrackEyesUseCase::new(
        open_capture()?,
        strategy,
        &settings,
        mode,
        Box::new(StdoutPipelineLogger::new(REPORT_EVERY)),
    );

    let mut sink = match &cli.preview {
        Some(dir) => {
            let sink = PngPreviewSink::new(dir)?;
            tracker.start_rendering()?;
            Some(sink)
        }
        None => None,
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }
    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));

    tracker.activate();
    let mut last = Instant::now();
    while !interrupted.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        let now = Instant::now();
        tracker.pump(now - last);
        last = now;

        for event in tracker.poll_events() {
            println!("{}: {}", event.source, event.event);
        }
        if let Some(sink) = sink.as_mut() {
            tracker.render_all(sink);
        }
        thread::sleep(HOST_FRAME);
    }

    if let Some(sink) = sink.as_mut() {
        tracker.stop_rendering(sink)?;
    }
    tracker.stop()?;
    for event in tracker.poll_events() {
        println!("{}: {}", event.source, event.event);
    }
    Ok(())
}

/// Loads the settings file, then lets command-line flags override it.
fn build_settings(cli: &Cli) -> Result<TrackerSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => TrackerSettings::load(path)?,
        None => match TrackerSettings::default_path() {
            Some(path) => TrackerSettings::load_or_default(&path)?,
            None => TrackerSettings::default(),
        },
    };

    if let Some(index) = cli.camera {
        settings.capture.source = VideoSource::Camera(index);
    }
    if let Some(path) = &cli.file {
        if !path.exists() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
        settings.capture.source = VideoSource::File(path.clone());
    }
    if let Some(strategy) = cli.strategy {
        settings.detection.strategy = strategy;
    }
    if let Some(rate) = cli.refresh_rate {
        settings.capture.refresh_rate = rate;
    }
    if let Some(rate) = cli.detect_rate {
        settings.detection.refresh_rate = rate;
    }
    if cli.resize.is_some() {
        settings.capture.resize = cli.resize;
    }
    if let Some(dir) = &cli.assets {
        settings.assets.dir = Some(dir.clone());
    }
    if cli.download_assets {
        settings.assets.download = true;
    }

    settings.validate()?;
    Ok(settings)
}

fn build_resolver(settings: &TrackerSettings) -> AssetResolver {
    let resolver = AssetResolver::new(settings.assets.dir.as_deref());
    if settings.assets.download {
        resolver.with_download(Some(Box::new(download_progress)))
    } else {
        resolver
    }
}

#[cfg(feature = "ffmpeg")]
fn open_capture() -> Result<Box<dyn VideoCapture>, Box<dyn std::error::Error>> {
    use blinkwatch_core::capture::infrastructure::ffmpeg_capture::FfmpegCapture;
    Ok(Box::new(FfmpegCapture::new()))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_capture() -> Result<Box<dyn VideoCapture>, Box<dyn std::error::Error>> {
    Err("built without a capture backend (enable the \"ffmpeg\" feature)".into())
}

fn parse_resize(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension '{s}': {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection assets... {pct}%");
    } else {
        eprint!("\rDownloading detection assets... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resize() {
        assert_eq!(parse_resize("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_resize("640X480"), Ok((640, 480)));
        assert!(parse_resize("1280").is_err());
        assert!(parse_resize("axb").is_err());
    }

    #[test]
    fn test_camera_and_file_conflict() {
        let parsed = Cli::try_parse_from(["blinkwatch", "--camera", "0", "--file", "a.mp4"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_negative_camera_index_rejected() {
        assert!(Cli::try_parse_from(["blinkwatch", "--camera", "-1"]).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        TrackerSettings::default().save(&path).unwrap();
        let cli = Cli::try_parse_from([
            "blinkwatch",
            "--settings",
            path.to_str().unwrap(),
            "--camera",
            "2",
            "--strategy",
            "hybrid",
            "--resize",
            "640x360",
            "--detect-rate",
            "0.1",
        ])
        .unwrap();
        let settings = build_settings(&cli).unwrap();
        assert_eq!(settings.capture.source, VideoSource::Camera(2));
        assert_eq!(settings.detection.strategy, StrategyKind::Hybrid);
        assert_eq!(settings.capture.resize, Some((640, 360)));
        assert_eq!(settings.detection.refresh_rate, 0.1);
    }

    #[test]
    fn test_out_of_range_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        TrackerSettings::default().save(&path).unwrap();
        let cli = Cli::try_parse_from([
            "blinkwatch",
            "--settings",
            path.to_str().unwrap(),
            "--refresh-rate",
            "2.5",
        ])
        .unwrap();
        assert!(build_settings(&cli).is_err());
    }
}
