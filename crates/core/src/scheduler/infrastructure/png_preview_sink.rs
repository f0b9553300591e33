use std::path::{Path, PathBuf};

use crate::scheduler::domain::renderer::PreviewSink;
use crate::shared::frame::Frame;

/// Preview sink that keeps the latest frame of each window as a PNG file
/// (`<dir>/<window>.png`), overwritten on every render.
pub struct PngPreviewSink {
    dir: PathBuf,
}

impl PngPreviewSink {
    pub fn new(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, window: &str) -> PathBuf {
        let stem: String = window
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{stem}.png"))
    }
}

impl PreviewSink for PngPreviewSink {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(());
        }
        let path = self.path_for(window);
        // Write beside the target and rename so readers never see half a PNG.
        let temp = path.with_extension("png.part");
        frame
            .to_rgb_image()
            .save_with_format(&temp, image::ImageFormat::Png)?;
        std::fs::rename(&temp, &path)?;
        Ok(())
    }

    fn close(&mut self, window: &str) {
        log::debug!("Preview window {window} closed");
    }
}
