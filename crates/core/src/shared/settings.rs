use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::frame_source::CaptureConfig;
use crate::capture::domain::video_source::VideoSource;
use crate::detection::domain::detection_strategy::{EyeAreaMode, StrategyKind};
use crate::detection::domain::object_detector::DetectParams;
use crate::detection::infrastructure::yunet_decoder::YunetParams;
use crate::shared::constants::{APP_DIR_NAME, MIN_OPEN_COOLDOWN_MS};
use crate::tracking::domain::temporal_state_tracker::TrackerConfig;

const DEFAULT_REFRESH_RATE: f64 = 1.0 / 30.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("resize dimensions must be non-zero, got {0}x{1}")]
    ZeroResize(u32, u32),
    #[error("capture.open_cooldown_ms must be non-zero")]
    ZeroCooldown,
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub source: VideoSource,
    /// Seconds between capture ticks.
    pub refresh_rate: f64,
    pub resize: Option<(u32, u32)>,
    pub open_cooldown_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: VideoSource::default(),
            refresh_rate: DEFAULT_REFRESH_RATE,
            resize: Some((1280, 720)),
            open_cooldown_ms: MIN_OPEN_COOLDOWN_MS,
        }
    }
}

impl CaptureSettings {
    /// Refresh rate is clamped to (0, 1] seconds and the cooldown raised to
    /// its minimum.
    pub fn to_config(&self) -> CaptureConfig {
        CaptureConfig {
            source: self.source.clone(),
            refresh_rate: clamp_refresh(self.refresh_rate),
            resize: self.resize,
            open_cooldown: Duration::from_millis(self.open_cooldown_ms.max(MIN_OPEN_COOLDOWN_MS)),
        }
    }
}

/// Sliding-window parameters for one cascade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeSettings {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: u32,
}

impl CascadeSettings {
    pub fn params(&self) -> DetectParams {
        DetectParams::new(self.scale_factor, self.min_neighbors, self.min_size)
    }
}

/// Where the face model runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceDevice {
    /// Platform accelerator when one registers, CPU otherwise.
    #[default]
    Auto,
    Cpu,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnnSettings {
    pub confidence: f32,
    pub nms_threshold: f64,
    pub top_k: usize,
    /// The face model sees the frame scaled by this factor.
    pub input_scale: f64,
    pub device: InferenceDevice,
}

impl Default for DnnSettings {
    fn default() -> Self {
        let yunet = YunetParams::default();
        Self {
            confidence: yunet.confidence,
            nms_threshold: yunet.nms_threshold,
            top_k: yunet.top_k,
            input_scale: 0.5,
            device: InferenceDevice::default(),
        }
    }
}

impl DnnSettings {
    pub fn yunet_params(&self) -> YunetParams {
        YunetParams {
            confidence: self.confidence,
            nms_threshold: self.nms_threshold,
            top_k: self.top_k,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub strategy: StrategyKind,
    pub refresh_rate: f64,
    pub face_cascade: CascadeSettings,
    pub eye_cascade: CascadeSettings,
    pub dnn: DnnSettings,
    /// Eyes larger than this fraction of the face area are discarded.
    pub max_eye_ratio: f64,
    /// Side of a landmark eye area as a fraction of face width.
    pub landmark_proportion: f64,
    /// Minimum eye size as a fraction of the landmark eye area.
    pub min_eye_proportion: f64,
    pub annotate: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            refresh_rate: DEFAULT_REFRESH_RATE,
            face_cascade: CascadeSettings {
                scale_factor: 1.3,
                min_neighbors: 5,
                min_size: 200,
            },
            eye_cascade: CascadeSettings {
                scale_factor: 1.3,
                min_neighbors: 2,
                min_size: 40,
            },
            dnn: DnnSettings::default(),
            max_eye_ratio: 0.1,
            landmark_proportion: 0.35,
            min_eye_proportion: 0.5,
            annotate: false,
        }
    }
}

impl DetectionSettings {
    pub fn interval(&self) -> Duration {
        clamp_refresh(self.refresh_rate)
    }

    /// Cascade uses fixed proportions; model-backed strategies use landmarks.
    pub fn eye_area_mode(&self) -> EyeAreaMode {
        match self.strategy {
            StrategyKind::Cascade => EyeAreaMode::Proportional,
            StrategyKind::Dnn | StrategyKind::Hybrid => EyeAreaMode::Landmarks {
                proportion: self.landmark_proportion,
                min_eye_proportion: self.min_eye_proportion,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Seconds without a new event before the same event may fire again.
    ///
    /// Every re-entry restarts the window, so a status that keeps being
    /// re-entered (or two winks closer together than the window) reports once.
    pub blink_reset_secs: f64,
    pub left_wink_reset_secs: f64,
    pub right_wink_reset_secs: f64,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            blink_reset_secs: 3.0,
            left_wink_reset_secs: 3.0,
            right_wink_reset_secs: 3.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Searched before the user cache directory.
    pub dir: Option<PathBuf>,
    pub download: bool,
}

/// Everything needed to build and run a tracker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub capture: CaptureSettings,
    pub detection: DetectionSettings,
    pub tracker: TrackerConfig,
    pub events: EventSettings,
    pub assets: AssetSettings,
}

impl TrackerSettings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Reads and validates a settings file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`load`](Self::load), but a file that does not exist yields the
    /// defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.capture;
        let d = &self.detection;
        let t = &self.tracker;
        let e = &self.events;

        in_unit_interval("capture.refresh_rate", c.refresh_rate)?;
        if let Some((w, h)) = c.resize {
            if w == 0 || h == 0 {
                return Err(ConfigError::ZeroResize(w, h));
            }
        }
        if c.open_cooldown_ms == 0 {
            return Err(ConfigError::ZeroCooldown);
        }

        in_unit_interval("detection.refresh_rate", d.refresh_rate)?;
        above_one("detection.face_cascade.scale_factor", d.face_cascade.scale_factor)?;
        above_one("detection.eye_cascade.scale_factor", d.eye_cascade.scale_factor)?;
        in_unit_interval("detection.dnn.confidence", d.dnn.confidence as f64)?;
        in_unit_interval("detection.dnn.nms_threshold", d.dnn.nms_threshold)?;
        in_unit_interval("detection.dnn.input_scale", d.dnn.input_scale)?;
        in_unit_interval("detection.max_eye_ratio", d.max_eye_ratio)?;
        in_unit_interval("detection.landmark_proportion", d.landmark_proportion)?;
        in_unit_interval("detection.min_eye_proportion", d.min_eye_proportion)?;

        positive("tracker.sample_window", t.sample_window)?;
        in_unit_interval("tracker.closed_eye_threshold", t.closed_eye_threshold)?;
        non_negative("tracker.open_multiplier", t.open_multiplier)?;
        non_negative("tracker.wink_multiplier", t.wink_multiplier)?;
        non_negative("tracker.blink_multiplier", t.blink_multiplier)?;
        non_negative("tracker.error_multiplier", t.error_multiplier)?;

        non_negative("events.blink_reset_secs", e.blink_reset_secs)?;
        non_negative("events.left_wink_reset_secs", e.left_wink_reset_secs)?;
        non_negative("events.right_wink_reset_secs", e.right_wink_reset_secs)?;
        Ok(())
    }
}

fn clamp_refresh(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs.min(1.0))
    } else {
        Duration::from_secs_f64(DEFAULT_REFRESH_RATE)
    }
}

fn check(
    field: &'static str,
    value: f64,
    ok: bool,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

fn in_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value > 0.0 && value <= 1.0, "in (0, 1]")
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value > 0.0, "positive")
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value >= 0.0, "non-negative")
}

fn above_one(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value > 1.0, "greater than 1")
}
