use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where frames come from: a camera device index or a video file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    Camera(u32),
    File(PathBuf),
}

impl Default for VideoSource {
    fn default() -> Self {
        VideoSource::Camera(0)
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Camera(index) => write!(f, "camera {index}"),
            VideoSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}
