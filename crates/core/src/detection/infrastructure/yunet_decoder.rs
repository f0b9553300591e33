//! Output decoding for the YuNet face detector.
//!
//! YuNet predicts on three feature maps (strides 8, 16, 32). Each cell
//! carries a class score, an objectness score, a box (centre offset and log
//! size, in stride units) and five landmarks. Decoding is kept free of the
//! inference runtime so it can be tested with hand-made tensors.

use crate::detection::domain::face_locator::{EyeLandmarks, FaceCandidate};
use crate::shared::rect::Rect;

pub const STRIDES: [usize; 3] = [8, 16, 32];

/// Score filtering and suppression settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YunetParams {
    pub confidence: f32,
    pub nms_threshold: f64,
    pub top_k: usize,
}

impl Default for YunetParams {
    fn default() -> Self {
        Self {
            confidence: 0.9,
            nms_threshold: 0.3,
            top_k: 2500,
        }
    }
}

/// Flattened head outputs for one stride.
pub struct StrideOutputs<'a> {
    pub stride: usize,
    pub cls: &'a [f32],
    pub obj: &'a [f32],
    pub bbox: &'a [f32],
    pub kps: &'a [f32],
}

/// Inputs are padded up to a multiple of the largest stride.
pub fn padded_size(width: u32, height: u32) -> (u32, u32) {
    let pad = |v: u32| v.div_ceil(32) * 32;
    (pad(width.max(1)), pad(height.max(1)))
}

/// Decodes every stride, then applies score filtering, top-K and NMS.
/// Coordinates are in model-input pixels.
pub fn decode(
    outputs: &[StrideOutputs<'_>],
    input_width: u32,
    input_height: u32,
    params: &YunetParams,
) -> Vec<FaceCandidate> {
    let (pad_w, pad_h) = padded_size(input_width, input_height);
    let mut raw = Vec::new();

    for out in outputs {
        let cols = pad_w as usize / out.stride;
        let rows = pad_h as usize / out.stride;
        let cells = (rows * cols)
            .min(out.cls.len())
            .min(out.obj.len())
            .min(out.bbox.len() / 4)
            .min(out.kps.len() / 10);
        let s = out.stride as f32;

        for idx in 0..cells {
            let cls = out.cls[idx].clamp(0.0, 1.0);
            let obj = out.obj[idx].clamp(0.0, 1.0);
            let score = (cls * obj).sqrt();
            if score < params.confidence {
                continue;
            }
            let (r, c) = ((idx / cols) as f32, (idx % cols) as f32);
            let b = &out.bbox[idx * 4..idx * 4 + 4];
            let cx = (c + b[0]) * s;
            let cy = (r + b[1]) * s;
            let w = b[2].exp() * s;
            let h = b[3].exp() * s;
            let k = &out.kps[idx * 10..idx * 10 + 10];
            // Landmark 0 is the subject's right eye, which appears on the
            // left of the image.
            let landmarks = EyeLandmarks {
                left: (((k[0] + c) * s) as f64, ((k[1] + r) * s) as f64),
                right: (((k[2] + c) * s) as f64, ((k[3] + r) * s) as f64),
            };
            raw.push(FaceCandidate {
                rect: Rect::new(
                    (cx - w / 2.0).round() as i32,
                    (cy - h / 2.0).round() as i32,
                    w.round() as i32,
                    h.round() as i32,
                ),
                landmarks: Some(landmarks),
                score,
            });
        }
    }

    suppress(raw, params)
}

/// Greedy non-maximum suppression over the `top_k` best candidates.
fn suppress(mut candidates: Vec<FaceCandidate>, params: &YunetParams) -> Vec<FaceCandidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(params.top_k);

    let mut kept: Vec<FaceCandidate> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| k.rect.iou(&candidate.rect) <= params.nms_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Head {
        stride: usize,
        cls: Vec<f32>,
        obj: Vec<f32>,
        bbox: Vec<f32>,
        kps: Vec<f32>,
    }

    impl Head {
        fn empty(stride: usize, width: u32, height: u32) -> Self {
            let (pw, ph) = padded_size(width, height);
            let cells = (pw as usize / stride) * (ph as usize / stride);
            Self {
                stride,
                cls: vec![0.0; cells],
                obj: vec![0.0; cells],
                bbox: vec![0.0; cells * 4],
                kps: vec![0.0; cells * 10],
            }
        }

        fn set(&mut self, idx: usize, score: f32, bbox: [f32; 4], eyes: [f32; 4]) {
            self.cls[idx] = score;
            self.obj[idx] = score;
            self.bbox[idx * 4..idx * 4 + 4].copy_from_slice(&bbox);
            self.kps[idx * 10..idx * 10 + 4].copy_from_slice(&eyes);
        }

        fn view(&self) -> StrideOutputs<'_> {
            StrideOutputs {
                stride: self.stride,
                cls: &self.cls,
                obj: &self.obj,
                bbox: &self.bbox,
                kps: &self.kps,
            }
        }
    }

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(640, 360), (640, 384));
        assert_eq!(padded_size(33, 1), (64, 32));
    }

    #[test]
    fn test_decodes_box_and_landmarks() {
        // 64x64 input, stride 32: 2x2 grid, cell 3 is row 1, col 1.
        let mut head = Head::empty(32, 64, 64);
        head.set(3, 0.95, [0.5, 0.25, 0.0, 0.0], [0.25, 0.5, 0.75, 0.5]);
        let faces = decode(&[head.view()], 64, 64, &YunetParams::default());

        assert_eq!(faces.len(), 1);
        let face = &faces[0];
        // cx = (1 + 0.5) * 32 = 48, cy = (1 + 0.25) * 32 = 40, w = h = 32.
        assert_eq!(face.rect, Rect::new(32, 24, 32, 32));
        assert_relative_eq!(face.score, 0.95, epsilon = 1e-6);
        let marks = face.landmarks.unwrap();
        assert_eq!(marks.left, (40.0, 48.0));
        assert_eq!(marks.right, (56.0, 48.0));
    }

    #[test]
    fn test_low_scores_filtered() {
        let mut head = Head::empty(32, 64, 64);
        head.set(0, 0.5, [0.5, 0.5, 0.0, 0.0], [0.0; 4]);
        assert!(decode(&[head.view()], 64, 64, &YunetParams::default()).is_empty());
    }

    #[test]
    fn test_score_is_geometric_mean() {
        let mut head = Head::empty(32, 64, 64);
        head.set(0, 1.0, [0.5, 0.5, 0.0, 0.0], [0.0; 4]);
        head.obj[0] = 0.81;
        let params = YunetParams {
            confidence: 0.5,
            ..YunetParams::default()
        };
        let faces = decode(&[head.view()], 64, 64, &params);
        assert_relative_eq!(faces[0].score, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_overlapping_boxes_suppressed() {
        let mut coarse = Head::empty(32, 64, 64);
        coarse.set(0, 0.92, [0.5, 0.5, 0.0, 0.0], [0.0; 4]);
        let mut fine = Head::empty(16, 64, 64);
        // Same 32x32 box centred at (16, 16) from the stride-16 head.
        fine.set(0, 0.97, [1.0, 1.0, 2f32.ln(), 2f32.ln()], [0.0; 4]);
        let faces = decode(&[fine.view(), coarse.view()], 64, 64, &YunetParams::default());
        assert_eq!(faces.len(), 1);
        assert_relative_eq!(faces[0].score, 0.97, epsilon = 1e-6);
    }

    #[test]
    fn test_top_k_limits_output() {
        let mut head = Head::empty(32, 64, 64);
        for idx in 0..4 {
            head.set(idx, 0.95, [0.5, 0.5, 0.0, 0.0], [0.0; 4]);
        }
        let params = YunetParams {
            top_k: 2,
            ..YunetParams::default()
        };
        assert_eq!(decode(&[head.view()], 64, 64, &params).len(), 2);
    }
}
