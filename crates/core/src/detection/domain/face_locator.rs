use image::GrayImage;

use crate::detection::domain::object_detector::{DetectParams, ObjectDetector};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Eye centres reported by a landmark-capable face detector, named by the
/// side of the image they appear on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeLandmarks {
    pub left: (f64, f64),
    pub right: (f64, f64),
}

impl EyeLandmarks {
    pub fn unscale(self, factor: f64) -> Self {
        Self {
            left: (self.left.0 / factor, self.left.1 / factor),
            right: (self.right.0 / factor, self.right.1 / factor),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FaceCandidate {
    pub rect: Rect,
    pub landmarks: Option<EyeLandmarks>,
    pub score: f32,
}

impl FaceCandidate {
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            rect,
            landmarks: None,
            score: 1.0,
        }
    }
}

/// Domain interface for face localisation.
///
/// Gets both the colour frame and its grayscale conversion so cascade and
/// DNN implementations can each use the representation they need.
pub trait FaceLocator: Send {
    fn locate(
        &mut self,
        frame: &Frame,
        gray: &GrayImage,
    ) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>>;
}

/// The candidate with the largest area. Earlier candidates win ties.
pub fn largest_face(candidates: &[FaceCandidate]) -> Option<&FaceCandidate> {
    let mut best: Option<&FaceCandidate> = None;
    for candidate in candidates.iter().filter(|c| !c.rect.is_empty()) {
        if best.map_or(true, |b| candidate.rect.area() > b.rect.area()) {
            best = Some(candidate);
        }
    }
    best
}

/// Asks `primary` first and falls back to `fallback` when it finds nothing
/// or fails.
pub struct FallbackFaceLocator {
    primary: Box<dyn FaceLocator>,
    fallback: Box<dyn FaceLocator>,
}

impl FallbackFaceLocator {
    pub fn new(primary: Box<dyn FaceLocator>, fallback: Box<dyn FaceLocator>) -> Self {
        Self { primary, fallback }
    }
}

impl FaceLocator for FallbackFaceLocator {
    fn locate(
        &mut self,
        frame: &Frame,
        gray: &GrayImage,
    ) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
        match self.primary.locate(frame, gray) {
            Ok(faces) if !faces.is_empty() => return Ok(faces),
            Ok(_) => {}
            Err(e) => log::debug!("Primary face locator failed, falling back: {e}"),
        }
        self.fallback.locate(frame, gray)
    }
}

/// Face locator backed by a grayscale object detector (a face cascade).
pub struct CascadeFaceLocator {
    detector: Box<dyn ObjectDetector>,
    params: DetectParams,
}

impl CascadeFaceLocator {
    pub fn new(detector: Box<dyn ObjectDetector>, params: DetectParams) -> Self {
        Self { detector, params }
    }
}

impl FaceLocator for CascadeFaceLocator {
    fn locate(
        &mut self,
        _frame: &Frame,
        gray: &GrayImage,
    ) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
        Ok(self
            .detector
            .detect(gray, &self.params)
            .into_iter()
            .map(FaceCandidate::from_rect)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLocator {
        result: Result<Vec<FaceCandidate>, String>,
        calls: usize,
    }

    impl FixedLocator {
        fn boxed(result: Result<Vec<FaceCandidate>, String>) -> Box<Self> {
            Box::new(Self { result, calls: 0 })
        }
    }

    impl FaceLocator for FixedLocator {
        fn locate(
            &mut self,
            _frame: &Frame,
            _gray: &GrayImage,
        ) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
            self.calls += 1;
            self.result.clone().map_err(|e| e.into())
        }
    }

    fn face(x: i32, w: i32, h: i32) -> FaceCandidate {
        FaceCandidate::from_rect(Rect::new(x, 0, w, h))
    }

    fn locate(locator: &mut dyn FaceLocator) -> Vec<FaceCandidate> {
        locator
            .locate(&Frame::empty(), &GrayImage::new(1, 1))
            .unwrap()
    }

    #[test]
    fn test_largest_face_picks_biggest_area() {
        let faces = vec![face(0, 20, 25), face(100, 40, 30), face(200, 10, 10)];
        assert_eq!(largest_face(&faces).unwrap().rect.x, 100);
    }

    #[test]
    fn test_largest_face_tie_keeps_first() {
        let faces = vec![face(0, 10, 10), face(50, 10, 10)];
        assert_eq!(largest_face(&faces).unwrap().rect.x, 0);
    }

    #[test]
    fn test_largest_face_ignores_empty() {
        assert!(largest_face(&[]).is_none());
        assert!(largest_face(&[face(0, 0, 10)]).is_none());
    }

    #[test]
    fn test_fallback_not_used_when_primary_finds_faces() {
        let mut locator = FallbackFaceLocator::new(
            FixedLocator::boxed(Ok(vec![face(1, 10, 10)])),
            FixedLocator::boxed(Ok(vec![face(2, 10, 10)])),
        );
        assert_eq!(locate(&mut locator)[0].rect.x, 1);
    }

    #[test]
    fn test_fallback_used_when_primary_empty() {
        let mut locator = FallbackFaceLocator::new(
            FixedLocator::boxed(Ok(vec![])),
            FixedLocator::boxed(Ok(vec![face(2, 10, 10)])),
        );
        assert_eq!(locate(&mut locator)[0].rect.x, 2);
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let mut locator = FallbackFaceLocator::new(
            FixedLocator::boxed(Err("session lost".into())),
            FixedLocator::boxed(Ok(vec![face(3, 10, 10)])),
        );
        assert_eq!(locate(&mut locator)[0].rect.x, 3);
    }

    struct FixedDetector(Vec<Rect>);

    impl ObjectDetector for FixedDetector {
        fn detect(&self, _image: &GrayImage, _params: &DetectParams) -> Vec<Rect> {
            self.0.clone()
        }
    }

    #[test]
    fn test_cascade_locator_wraps_detections() {
        let detector = FixedDetector(vec![Rect::new(1, 2, 30, 30)]);
        let mut locator = CascadeFaceLocator::new(Box::new(detector), DetectParams::new(1.3, 5, 20));
        let faces = locate(&mut locator);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].rect, Rect::new(1, 2, 30, 30));
        assert!(faces[0].landmarks.is_none());
    }

    #[test]
    fn test_landmarks_unscale() {
        let marks = EyeLandmarks {
            left: (10.0, 20.0),
            right: (30.0, 20.0),
        };
        let full = marks.unscale(0.5);
        assert_eq!(full.left, (20.0, 40.0));
        assert_eq!(full.right, (60.0, 40.0));
    }
}
