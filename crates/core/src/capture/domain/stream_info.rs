use std::fmt;

use crate::capture::domain::video_source::VideoSource;

/// Properties of an opened capture session, reported once per open.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub source: VideoSource,
    pub backend: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub pixel_format: String,
    pub codec: String,
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {}: {}x{} @ {:.2} fps, format {}, codec {}",
            self.source, self.backend, self.width, self.height, self.fps, self.pixel_format, self.codec
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_properties() {
        let info = StreamInfo {
            source: VideoSource::Camera(0),
            backend: "v4l2".to_string(),
            width: 1280,
            height: 720,
            fps: 30.0,
            pixel_format: "yuyv422".to_string(),
            codec: "rawvideo".to_string(),
        };
        let text = info.to_string();
        assert!(text.starts_with("camera 0 via v4l2"));
        assert!(text.contains("1280x720"));
        assert!(text.contains("30.00 fps"));
        assert!(text.contains("yuyv422"));
        assert!(text.contains("rawvideo"));
    }
}
