pub mod domain;
#[cfg(feature = "ffmpeg")]
pub mod infrastructure;
