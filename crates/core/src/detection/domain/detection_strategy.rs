use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::detection::domain::annotation::{draw_eye, draw_rect};
use crate::detection::domain::eye_filter::select_eyes;
use crate::detection::domain::eye_regions::{
    landmark_eye_areas, min_eye_size, proportional_eye_areas, EyeAreas,
};
use crate::detection::domain::eye_status::EyeStatus;
use crate::detection::domain::face_locator::{largest_face, FaceCandidate, FaceLocator};
use crate::detection::domain::object_detector::{DetectParams, ObjectDetector};
use crate::shared::constants::{
    EYE_AREA_COLOR, EYE_COLOR, FACE_COLOR, PREFILTER_EYE_COLOR, PREFILTER_FACE_COLOR,
};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Which face/eye localisation pair a pipeline is built with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Face cascade, proportional eye areas, eye cascade.
    #[default]
    Cascade,
    /// DNN face detector, landmark eye areas, eye cascade.
    Dnn,
    /// DNN face detector with a face-cascade fallback.
    Hybrid,
}

impl StrategyKind {
    pub fn needs_face_model(self) -> bool {
        matches!(self, StrategyKind::Dnn | StrategyKind::Hybrid)
    }

    pub fn needs_face_cascade(self) -> bool {
        matches!(self, StrategyKind::Cascade | StrategyKind::Hybrid)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Cascade => "cascade",
            StrategyKind::Dnn => "dnn",
            StrategyKind::Hybrid => "hybrid",
        })
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cascade" => Ok(StrategyKind::Cascade),
            "dnn" => Ok(StrategyKind::Dnn),
            "hybrid" => Ok(StrategyKind::Hybrid),
            other => Err(format!("unknown strategy '{other}' (expected cascade, dnn or hybrid)")),
        }
    }
}

/// How eye search areas are derived from the chosen face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EyeAreaMode {
    Proportional,
    /// Squares around model landmarks; falls back to proportional areas for
    /// faces that carry no landmarks.
    Landmarks {
        proportion: f64,
        min_eye_proportion: f64,
    },
}

/// Everything one frame's detection produced. Eye candidate rectangles are
/// in frame coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    pub faces: Vec<Rect>,
    pub face: Option<FaceCandidate>,
    pub areas: Option<EyeAreas>,
    pub left_candidates: Vec<Rect>,
    pub right_candidates: Vec<Rect>,
    pub left_eye: Option<Rect>,
    pub right_eye: Option<Rect>,
    pub face_ms: f64,
    pub eyes_ms: f64,
}

impl Observation {
    pub fn status(&self, missing_eyes_as_error: bool) -> EyeStatus {
        EyeStatus::classify(
            self.face.is_some(),
            self.left_eye.is_some(),
            self.right_eye.is_some(),
            missing_eyes_as_error,
        )
    }

    /// Draws candidates, the chosen face, eye areas and chosen eyes.
    pub fn annotate(&self, frame: &mut Frame) {
        for face in &self.faces {
            draw_rect(frame, face, PREFILTER_FACE_COLOR, 2);
        }
        if let Some(face) = &self.face {
            draw_rect(frame, &face.rect, FACE_COLOR, 2);
        }
        if let Some(areas) = &self.areas {
            draw_rect(frame, &areas.left, EYE_AREA_COLOR, 2);
            draw_rect(frame, &areas.right, EYE_AREA_COLOR, 2);
        }
        for eye in self.left_candidates.iter().chain(&self.right_candidates) {
            draw_rect(frame, eye, PREFILTER_EYE_COLOR, 1);
        }
        for eye in self.left_eye.iter().chain(&self.right_eye) {
            draw_eye(frame, eye, EYE_COLOR);
        }
    }
}

/// A face locator and an eye detector composed into one per-frame search.
pub struct DetectionStrategy {
    kind: StrategyKind,
    faces: Box<dyn FaceLocator>,
    eyes: Box<dyn ObjectDetector>,
    eye_areas: EyeAreaMode,
    eye_params: DetectParams,
    max_eye_ratio: f64,
}

impl DetectionStrategy {
    pub fn new(
        kind: StrategyKind,
        faces: Box<dyn FaceLocator>,
        eyes: Box<dyn ObjectDetector>,
        eye_areas: EyeAreaMode,
        eye_params: DetectParams,
        max_eye_ratio: f64,
    ) -> Self {
        Self {
            kind,
            faces,
            eyes,
            eye_areas,
            eye_params,
            max_eye_ratio,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Runs face localisation and the eye search on one frame.
    ///
    /// Errors come only from the face locator; finding nothing is a normal
    /// observation.
    pub fn observe(&mut self, frame: &Frame) -> Result<Observation, Box<dyn std::error::Error>> {
        let gray = frame.to_gray();

        let started = Instant::now();
        let candidates = self.faces.locate(frame, &gray)?;
        let mut observation = Observation {
            faces: candidates.iter().map(|c| c.rect).collect(),
            face_ms: started.elapsed().as_secs_f64() * 1000.0,
            ..Observation::default()
        };
        let Some(face) = largest_face(&candidates).cloned() else {
            return Ok(observation);
        };

        let started = Instant::now();
        let areas = self.eye_areas_for(&face, frame.width(), frame.height());
        let mut left = self.search(&gray, &areas.left);
        let mut right = self.search(&gray, &areas.right);
        observation.left_candidates = left.clone();
        observation.right_candidates = right.clone();

        let (left_eye, right_eye) = select_eyes(&mut left, &mut right, &face.rect, self.max_eye_ratio);
        observation.left_eye = left_eye;
        observation.right_eye = right_eye;
        observation.areas = Some(areas);
        observation.face = Some(face);
        observation.eyes_ms = started.elapsed().as_secs_f64() * 1000.0;
        Ok(observation)
    }

    fn eye_areas_for(&self, face: &FaceCandidate, width: u32, height: u32) -> EyeAreas {
        let areas = match (self.eye_areas, &face.landmarks) {
            (EyeAreaMode::Landmarks { proportion, .. }, Some(marks)) => {
                landmark_eye_areas(&face.rect, marks, proportion, width, height)
            }
            _ => proportional_eye_areas(&face.rect),
        };
        EyeAreas {
            left: areas.left.clamp_to(width, height),
            right: areas.right.clamp_to(width, height),
        }
    }

    fn search(&self, gray: &GrayImage, area: &Rect) -> Vec<Rect> {
        if area.is_empty() {
            return Vec::new();
        }
        let params = match self.eye_areas {
            EyeAreaMode::Landmarks {
                min_eye_proportion,
                ..
            } => DetectParams {
                min_size: min_eye_size(area, min_eye_proportion),
                max_size: Some((area.width as u32, area.height as u32)),
                ..self.eye_params
            },
            EyeAreaMode::Proportional => self.eye_params,
        };
        let roi = image::imageops::crop_imm(
            gray,
            area.x as u32,
            area.y as u32,
            area.width as u32,
            area.height as u32,
        )
        .to_image();
        self.eyes
            .detect(&roi, &params)
            .into_iter()
            .map(|eye| eye.offset(area.x, area.y))
            .collect()
    }
}
