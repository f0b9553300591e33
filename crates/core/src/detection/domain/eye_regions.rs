//! Where to look for each eye once a face is known.

use crate::detection::domain::face_locator::EyeLandmarks;
use crate::shared::rect::Rect;

/// Search areas for the eye on each side of the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EyeAreas {
    pub left: Rect,
    pub right: Rect,
}

/// Fixed proportions of the face box: the band from 25% to 50% of the face
/// height, 30% of the face width on each side, inset 17% from the edges.
pub fn proportional_eye_areas(face: &Rect) -> EyeAreas {
    let fw = face.width as f64;
    let fh = face.height as f64;
    let y = face.y + (fh * 0.25) as i32;
    let height = (fh * 0.25) as i32;
    let width = (fw * 0.3) as i32;

    let left = Rect::new(face.x + (fw * 0.17) as i32, y, width, height);
    let right = Rect::new(face.x + (fw * 0.83) as i32 - width, y, width, height);
    EyeAreas { left, right }
}

/// Squares of side `face.width * proportion` centred on each landmark, kept
/// inside the `frame_width` x `frame_height` image.
pub fn landmark_eye_areas(
    face: &Rect,
    landmarks: &EyeLandmarks,
    proportion: f64,
    frame_width: u32,
    frame_height: u32,
) -> EyeAreas {
    let side = (face.width as f64 * proportion) as i32;
    let square = |(cx, cy): (f64, f64)| {
        let x = (cx as i32 - side / 2).max(0);
        let y = (cy as i32 - side / 2).max(0);
        Rect::new(x, y, side, side).clamp_to(frame_width, frame_height)
    };
    EyeAreas {
        left: square(landmarks.left),
        right: square(landmarks.right),
    }
}

/// Smallest eye worth reporting inside a landmark area.
pub fn min_eye_size(area: &Rect, proportion: f64) -> (u32, u32) {
    (
        (area.width.max(0) as f64 * proportion) as u32,
        (area.height.max(0) as f64 * proportion) as u32,
    )
}
