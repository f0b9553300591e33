use std::sync::Arc;

use crate::capture::domain::frame_cell::FrameCell;
use crate::scheduler::domain::renderer::{PreviewSink, Renderable};

/// Shows whatever frame is currently published in a cell.
pub struct FramePreview {
    window: String,
    cell: Arc<FrameCell>,
}

impl FramePreview {
    pub fn new(window: impl Into<String>, cell: Arc<FrameCell>) -> Self {
        Self {
            window: window.into(),
            cell,
        }
    }
}

impl Renderable for FramePreview {
    fn window_name(&self) -> &str {
        &self.window
    }

    fn render(&mut self, sink: &mut dyn PreviewSink) -> bool {
        let Some(frame) = self.cell.snapshot() else {
            return false;
        };
        if let Err(e) = sink.show(&self.window, &frame) {
            log::warn!("Preview {} failed: {e}", self.window);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;

    #[derive(Default)]
    struct CountingSink {
        shown: Vec<usize>,
    }

    impl PreviewSink for CountingSink {
        fn show(&mut self, _window: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.shown.push(frame.index());
            Ok(())
        }

        fn close(&mut self, _window: &str) {}
    }

    #[test]
    fn test_empty_cell_renders_nothing() {
        let mut preview = FramePreview::new("raw", Arc::new(FrameCell::new()));
        let mut sink = CountingSink::default();
        assert!(!preview.render(&mut sink));
        assert!(sink.shown.is_empty());
    }

    #[test]
    fn test_renders_latest_frame() {
        let cell = Arc::new(FrameCell::new());
        cell.publish(Frame::new(vec![0; 3], 1, 1, 3, 4));
        let mut preview = FramePreview::new("raw", Arc::clone(&cell));
        let mut sink = CountingSink::default();
        assert!(preview.render(&mut sink));
        assert_eq!(sink.shown, vec![4]);
        assert_eq!(preview.window_name(), "raw");
    }
}
