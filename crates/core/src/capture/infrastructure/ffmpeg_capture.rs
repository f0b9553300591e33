use crate::capture::domain::stream_info::StreamInfo;
use crate::capture::domain::video_capture::VideoCapture;
use crate::capture::domain::video_source::VideoSource;
use crate::shared::frame::Frame;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;

/// Captures BGR frames from files (libavformat) or camera devices
/// (libavdevice: v4l2 on Linux, AVFoundation on macOS).
pub struct FfmpegCapture {
    session: Option<Session>,
}

struct Session {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    scaler: Option<Scaler>,
    draining: bool,
}

struct Scaler {
    context: scaling::Context,
    format: Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegCapture is driven by one worker at a time; the ffmpeg
// handles it owns are never shared across threads.
unsafe impl Send for FfmpegCapture {}

impl FfmpegCapture {
    pub fn new() -> Self {
        Self { session: None }
    }
}

impl Default for FfmpegCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoCapture for FfmpegCapture {
    fn open(&mut self, source: &VideoSource) -> Result<StreamInfo, Box<dyn std::error::Error>> {
        self.close();
        ffmpeg_next::init()?;

        let (input, backend) = open_input(source)?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.avg_frame_rate();
        let rate = if rate.denominator() != 0 && rate.numerator() != 0 {
            rate
        } else {
            stream.rate()
        };
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let info = StreamInfo {
            source: source.clone(),
            backend,
            width: decoder.width(),
            height: decoder.height(),
            fps,
            pixel_format: format!("{:?}", decoder.format()).to_lowercase(),
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        };

        self.session = Some(Session {
            input,
            decoder,
            stream_index,
            scaler: None,
            draining: false,
        });
        Ok(info)
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(session) = self.session.as_mut() else {
            return Err("FfmpegCapture: not opened".into());
        };
        session.next_frame()
    }

    fn close(&mut self) {
        self.session = None;
    }
}

impl Session {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        loop {
            let mut decoded = VideoFrame::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.draining {
                return Ok(None);
            }

            let Some((stream, packet)) = self.input.packets().next() else {
                self.decoder.send_eof()?;
                self.draining = true;
                continue;
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
            }
        }
    }

    fn convert(&mut self, decoded: &VideoFrame) -> Result<Frame, Box<dyn std::error::Error>> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.format != format || s.width != width || s.height != height);
        if stale {
            let context = scaling::Context::get(
                format,
                width,
                height,
                Pixel::BGR24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(Scaler {
                context,
                format,
                width,
                height,
            });
        }
        let scaler = self.scaler.as_mut().ok_or("scaler unavailable")?;

        let mut bgr = VideoFrame::empty();
        scaler.context.run(decoded, &mut bgr)?;
        let pixels = extract_packed_pixels(&bgr, width, height);
        Ok(Frame::new(pixels, width, height, 3, 0))
    }
}

fn open_input(
    source: &VideoSource,
) -> Result<(ffmpeg_next::format::context::Input, String), Box<dyn std::error::Error>> {
    match source {
        VideoSource::File(path) => {
            let input = ffmpeg_next::format::input(path)?;
            let backend = input.format().name().to_string();
            Ok((input, backend))
        }
        VideoSource::Camera(index) => open_camera(*index),
    }
}

fn open_camera(
    index: u32,
) -> Result<(ffmpeg_next::format::context::Input, String), Box<dyn std::error::Error>> {
    let (backend, device) = camera_device(index)?;
    ffmpeg_next::device::register_all();

    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name().split(',').any(|n| n == backend))
        .ok_or_else(|| format!("capture backend {backend} is unavailable"))?;

    let context = ffmpeg_next::format::open_with(
        &device,
        &ffmpeg_next::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )?;
    match context {
        ffmpeg_next::format::context::Context::Input(input) => Ok((input, backend.to_string())),
        ffmpeg_next::format::context::Context::Output(_) => {
            Err(format!("{backend} opened {device} as an output").into())
        }
    }
}

/// Maps a camera index to the platform's capture backend and device name.
fn camera_device(index: u32) -> Result<(&'static str, String), Box<dyn std::error::Error>> {
    if cfg!(target_os = "linux") {
        Ok(("video4linux2", format!("/dev/video{index}")))
    } else if cfg!(target_os = "macos") {
        Ok(("avfoundation", format!("{index}:none")))
    } else {
        Err("camera capture by index is not supported on this platform".into())
    }
}

/// Copies pixel data from an ffmpeg frame into a tightly packed buffer.
///
/// ffmpeg frames may pad each row (stride > width * 3); the padding is dropped.
fn extract_packed_pixels(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    /// Encodes `num_frames` solid grey frames with MPEG-4 into `path`.
    fn write_clip(path: &Path, num_frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let fps = 25;
        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut enc = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(Pixel::YUV420P);
        enc.set_time_base(ffmpeg_next::Rational(1, fps));
        enc.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            enc.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = enc.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let time_base = octx.stream(0).unwrap().time_base();

        let mut to_yuv = scaling::Context::get(
            Pixel::BGR24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut bgr = VideoFrame::new(Pixel::BGR24, width, height);
            let value = ((i * 40) % 256) as u8;
            bgr.data_mut(0).fill(value);
            let mut yuv = VideoFrame::empty();
            to_yuv.run(&bgr, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            let mut packet = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut packet).is_ok() {
                packet.set_stream(0);
                packet.rescale_ts(ffmpeg_next::Rational(1, fps), time_base);
                packet.write_interleaved(&mut octx).unwrap();
            }
        }
        encoder.send_eof().unwrap();
        let mut packet = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg_next::Rational(1, fps), time_base);
            packet.write_interleaved(&mut octx).unwrap();
        }
        octx.write_trailer().unwrap();
    }

    fn clip(dir: &Path, frames: usize) -> PathBuf {
        let path = dir.join("clip.mp4");
        write_clip(&path, frames, 160, 120);
        path
    }

    #[test]
    fn test_open_file_reports_stream_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = clip(dir.path(), 5);

        let mut capture = FfmpegCapture::new();
        let info = capture.open(&VideoSource::File(path.clone())).unwrap();
        assert_eq!(info.width, 160);
        assert_eq!(info.height, 120);
        assert!(info.fps > 0.0);
        assert_eq!(info.codec, "mpeg4");
        assert_eq!(info.source, VideoSource::File(path));
    }

    #[test]
    fn test_reads_every_frame_then_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = clip(dir.path(), 5);

        let mut capture = FfmpegCapture::new();
        capture.open(&VideoSource::File(path)).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = capture.read().unwrap() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.width() == 160 && f.channels() == 3));
        assert!(capture.read().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut capture = FfmpegCapture::new();
        let result = capture.open(&VideoSource::File(PathBuf::from("/nonexistent/clip.mp4")));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_before_open_fails() {
        let mut capture = FfmpegCapture::new();
        assert!(capture.read().is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = clip(dir.path(), 2);
        let mut capture = FfmpegCapture::new();
        capture.open(&VideoSource::File(path)).unwrap();
        capture.close();
        capture.close();
        assert!(capture.read().is_err());
    }
}
