use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};

/// A single captured frame: contiguous BGR bytes in row-major order.
///
/// A frame with no pixels is the "empty" sentinel returned when nothing has
/// been published yet. Frames are shared by value; once published they are
/// never written to again.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            channels: 3,
            index: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Publish sequence number assigned by the frame source.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Luma conversion with the fixed-point BT.601 weights used by cascade
    /// training tools (B 0.114, G 0.587, R 0.299).
    pub fn to_gray(&self) -> GrayImage {
        let pixels = (self.width as usize) * (self.height as usize);
        let ch = self.channels as usize;
        let mut gray = Vec::with_capacity(pixels);
        match ch {
            0 => gray.resize(pixels, 0),
            1 | 2 => gray.extend(self.data.chunks_exact(ch).map(|p| p[0])),
            _ => gray.extend(self.data.chunks_exact(ch).map(|p| {
                let (b, g, r) = (p[0] as u32, p[1] as u32, p[2] as u32);
                ((b * 1868 + g * 9617 + r * 4899 + 8192) >> 14) as u8
            })),
        }
        GrayImage::from_raw(self.width, self.height, gray).unwrap_or_default()
    }

    /// Bilinear resize to the given dimensions, keeping the index.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.is_empty() || (width == self.width && height == self.height) {
            return self.clone();
        }
        if self.channels != 3 {
            let gray = image::imageops::resize(&self.to_gray(), width, height, FilterType::Triangle);
            return Frame::new(gray.into_raw(), width, height, 1, self.index);
        }
        // BGR bytes are carried in an Rgb container; resampling is channel-agnostic.
        let Some(buffer) = RgbImage::from_raw(self.width, self.height, self.data.clone()) else {
            return self.clone();
        };
        let out = image::imageops::resize(&buffer, width, height, FilterType::Triangle);
        Frame::new(out.into_raw(), width, height, 3, self.index)
    }

    /// Uniformly scaled copy; dimensions are rounded and never drop below 1.
    pub fn scaled(&self, factor: f64) -> Frame {
        let w = ((self.width as f64 * factor).round() as u32).max(1);
        let h = ((self.height as f64 * factor).round() as u32).max(1);
        self.resized(w, h)
    }

    /// RGB copy for encoders that expect RGB ordering.
    pub fn to_rgb_image(&self) -> RgbImage {
        let ch = self.channels as usize;
        let mut out: RgbImage = ImageBuffer::new(self.width, self.height);
        if ch == 0 {
            return out;
        }
        for (dst, src) in out.pixels_mut().zip(self.data.chunks_exact(ch)) {
            *dst = if ch >= 3 {
                Rgb([src[2], src[1], src[0]])
            } else {
                Rgb([src[0], src[0], src[0]])
            };
        }
        out
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}
