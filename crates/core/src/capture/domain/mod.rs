pub mod frame_cell;
pub mod frame_preview;
pub mod frame_source;
pub mod source_liveness;
pub mod stream_info;
pub mod video_capture;
pub mod video_source;
