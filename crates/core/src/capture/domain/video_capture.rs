use crate::capture::domain::stream_info::StreamInfo;
use crate::capture::domain::video_source::VideoSource;
use crate::shared::frame::Frame;

/// A decode session over a camera or a video file.
///
/// Implementations own their codec/device handles; the frame source drives
/// them from a single worker at a time.
pub trait VideoCapture: Send {
    /// Opens a session, replacing any session already held.
    fn open(&mut self, source: &VideoSource) -> Result<StreamInfo, Box<dyn std::error::Error>>;

    /// Decodes the next frame as BGR. `Ok(None)` signals end of stream.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the session. Calling it without an open session is a no-op.
    fn close(&mut self);
}
