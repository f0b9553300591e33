use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::shared::frame::Frame;

/// Single-slot, latest-wins frame buffer shared between one producer and
/// any number of readers.
///
/// Publishing swaps in a whole new `Arc<Frame>`, so readers only ever see a
/// complete frame: either the one before the swap or the one after. Readers
/// never block the producer.
#[derive(Default)]
pub struct FrameCell {
    slot: ArcSwapOption<Frame>,
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame. Publishing an empty frame clears the cell.
    pub fn publish(&self, frame: Frame) {
        if frame.is_empty() {
            self.clear();
        } else {
            self.slot.store(Some(Arc::new(frame)));
        }
    }

    pub fn clear(&self) {
        self.slot.store(None);
    }

    /// Immutable snapshot of the current frame, if any.
    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.slot.load_full()
    }

    /// Owned copy of the current frame, or the empty sentinel.
    pub fn latest_frame(&self) -> Frame {
        self.snapshot()
            .map(|frame| Frame::clone(&frame))
            .unwrap_or_default()
    }

    pub fn latest_index(&self) -> Option<usize> {
        Option::as_ref(&self.slot.load()).map(|frame| frame.index())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }
}
