use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, EYE_CASCADE_NAME, EYE_CASCADE_URL, FACE_CASCADE_NAME, FACE_CASCADE_URL,
    YUNET_MODEL_NAME, YUNET_MODEL_URL,
};

/// Construction-time failures around detection assets. None of these are
/// recoverable at runtime: the tracker refuses to start without its assets.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("required asset {name} not found (searched: {searched:?})")]
    Missing { name: String, searched: Vec<PathBuf> },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade {path}: {reason}")]
    MalformedCascade { path: PathBuf, reason: String },
    #[error("failed to load face model {path}: {reason}")]
    Model { path: PathBuf, reason: String },
    #[error("the {0} backend is not compiled into this build")]
    BackendUnavailable(&'static str),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write asset to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Files the detection strategies load at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Asset {
    FaceCascade,
    EyeCascade,
    FaceModel,
}

impl Asset {
    pub fn file_name(self) -> &'static str {
        match self {
            Asset::FaceCascade => FACE_CASCADE_NAME,
            Asset::EyeCascade => EYE_CASCADE_NAME,
            Asset::FaceModel => YUNET_MODEL_NAME,
        }
    }

    pub fn url(self) -> &'static str {
        match self {
            Asset::FaceCascade => FACE_CASCADE_URL,
            Asset::EyeCascade => EYE_CASCADE_URL,
            Asset::FaceModel => YUNET_MODEL_URL,
        }
    }
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Locates asset files on disk, optionally fetching missing ones.
///
/// Resolution order:
/// 1. The configured asset directory
/// 2. The user cache directory (platform-specific)
/// 3. Download into the cache, only when downloads were enabled
pub struct AssetResolver {
    asset_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    download: bool,
    progress: Option<ProgressFn>,
}

impl AssetResolver {
    pub fn new(asset_dir: Option<&Path>) -> Self {
        Self {
            asset_dir: asset_dir.map(Path::to_path_buf),
            cache_dir: asset_cache_dir().ok(),
            download: false,
            progress: None,
        }
    }

    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn with_download(mut self, progress: Option<ProgressFn>) -> Self {
        self.download = true;
        self.progress = progress;
        self
    }

    pub fn resolve(&self, asset: Asset) -> Result<PathBuf, AssetError> {
        let name = asset.file_name();
        let mut searched = Vec::new();

        for dir in [&self.asset_dir, &self.cache_dir].into_iter().flatten() {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        if !self.download {
            return Err(AssetError::Missing {
                name: name.to_string(),
                searched,
            });
        }

        let cache_dir = self.cache_dir.as_ref().ok_or(AssetError::NoCacheDir)?;
        fs::create_dir_all(cache_dir).map_err(AssetError::CacheDir)?;
        let dest = cache_dir.join(name);
        log::info!("Downloading {name} from {}", asset.url());
        download(asset.url(), &dest, self.progress.as_ref())?;
        Ok(dest)
    }
}

/// Platform-specific asset cache directory.
///
/// - macOS: `~/Library/Application Support/BlinkWatch/assets/`
/// - Linux: `$XDG_CACHE_HOME/BlinkWatch/assets/` or `~/.cache/BlinkWatch/assets/`
/// - Windows: `%LOCALAPPDATA%/BlinkWatch/assets/`
pub fn asset_cache_dir() -> Result<PathBuf, AssetError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("assets"))
        .ok_or(AssetError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<&ProgressFn>) -> Result<(), AssetError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| AssetError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(|e| AssetError::Download {
        url: url.to_string(),
        source: e,
    })?;

    let temp_path = dest.with_extension("part");
    let write_err = |e: std::io::Error| AssetError::Write {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        if let Err(e) = file.write_all(chunk) {
            drop(file);
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(e));
        }
        downloaded += chunk.len() as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| AssetError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
