use image::GrayImage;

use crate::shared::rect::Rect;

/// Multi-scale sliding-window search parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Pyramid step between scales; must be > 1.
    pub scale_factor: f64,
    /// Raw hits a grouped detection needs to survive. 0 disables grouping.
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    /// Defaults to the image size.
    pub max_size: Option<(u32, u32)>,
}

impl DetectParams {
    pub fn new(scale_factor: f64, min_neighbors: u32, min_size: u32) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            min_size: (min_size, min_size),
            max_size: None,
        }
    }

    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_size = Some((width, height));
        self
    }
}

/// Domain interface for a grayscale object detector (face or eye cascade).
///
/// Returned rectangles are in the coordinates of `image`.
pub trait ObjectDetector: Send {
    fn detect(&self, image: &GrayImage, params: &DetectParams) -> Vec<Rect>;
}
