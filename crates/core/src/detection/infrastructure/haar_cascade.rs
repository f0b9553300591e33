//! Boosted Haar cascade evaluator for OpenCV cascade XML files.
//!
//! Loads the `opencv-cascade-classifier` format (BOOST stages over HAAR
//! features, upright and 45° tilted) and runs a multi-scale sliding-window
//! search over an image pyramid, merging raw hits with
//! [`group_rectangles`].

use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;
use serde::Deserialize;

use crate::detection::domain::object_detector::{DetectParams, ObjectDetector};
use crate::detection::infrastructure::math::group_rectangles;
use crate::shared::asset_resolver::AssetError;
use crate::shared::rect::Rect;

/// Subtracted from every stage threshold, as the training tools do.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

/// Similarity tolerance when merging raw hits.
const GROUP_EPS: f64 = 0.2;

// ---------------------------------------------------------------------------
// XML layout
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StorageXml {
    cascade: CascadeXml,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CascadeXml {
    stage_type: String,
    feature_type: String,
    height: u32,
    width: u32,
    stages: ListXml<StageXml>,
    features: ListXml<FeatureXml>,
}

/// OpenCV storage writes sequences as repeated `<_>` elements.
#[derive(Deserialize)]
struct ListXml<T> {
    #[serde(rename = "_", default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageXml {
    stage_threshold: f64,
    weak_classifiers: ListXml<WeakClassifierXml>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakClassifierXml {
    internal_nodes: String,
    leaf_values: String,
}

#[derive(Deserialize)]
struct FeatureXml {
    rects: ListXml<String>,
    #[serde(default)]
    tilted: u8,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct WeightedRect {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    weight: f64,
}

#[derive(Clone, Debug)]
struct Feature {
    rects: Vec<WeightedRect>,
    tilted: bool,
}

/// A split node. Child values > 0 index another node; values <= 0 index
/// leaf `-value`.
#[derive(Clone, Debug)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Clone, Debug)]
struct WeakClassifier {
    nodes: Vec<Node>,
    leaves: Vec<f64>,
}

#[derive(Clone, Debug)]
struct Stage {
    threshold: f64,
    weak: Vec<WeakClassifier>,
}

/// A loaded cascade. Immutable once built, so one instance can serve any
/// number of searches.
#[derive(Clone, Debug)]
pub struct HaarCascade {
    width: u32,
    height: u32,
    stages: Vec<Stage>,
    features: Vec<Feature>,
    has_tilted: bool,
}

impl HaarCascade {
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let xml = std::fs::read_to_string(path).map_err(|source| AssetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cascade = Self::from_xml(&xml).map_err(|reason| AssetError::MalformedCascade {
            path: path.to_path_buf(),
            reason,
        })?;
        log::info!(
            "Loaded cascade {} ({}x{} window, {} stages, {} features)",
            path.display(),
            cascade.width,
            cascade.height,
            cascade.stages.len(),
            cascade.features.len()
        );
        Ok(cascade)
    }

    pub fn from_xml(xml: &str) -> Result<Self, String> {
        let storage: StorageXml = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;
        let raw = storage.cascade;

        if !raw.stage_type.trim().eq_ignore_ascii_case("BOOST") {
            return Err(format!("unsupported stage type {}", raw.stage_type.trim()));
        }
        if !raw.feature_type.trim().eq_ignore_ascii_case("HAAR") {
            return Err(format!("unsupported feature type {}", raw.feature_type.trim()));
        }
        if raw.width < 3 || raw.height < 3 {
            return Err(format!("window {}x{} is too small", raw.width, raw.height));
        }

        let features = raw
            .features
            .items
            .iter()
            .enumerate()
            .map(|(i, f)| {
                parse_feature(f, raw.width as i64, raw.height as i64)
                    .map_err(|e| format!("feature {i}: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut stages = Vec::with_capacity(raw.stages.items.len());
        for (si, stage) in raw.stages.items.iter().enumerate() {
            let weak = stage
                .weak_classifiers
                .items
                .iter()
                .enumerate()
                .map(|(wi, w)| {
                    parse_weak(w, features.len()).map_err(|e| format!("stage {si} classifier {wi}: {e}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            stages.push(Stage {
                threshold: stage.stage_threshold - STAGE_THRESHOLD_EPS,
                weak,
            });
        }
        if stages.is_empty() {
            return Err("cascade has no stages".into());
        }

        let has_tilted = features.iter().any(|f| f.tilted);
        Ok(Self {
            width: raw.width,
            height: raw.height,
            stages,
            features,
            has_tilted,
        })
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_tilted_features(&self) -> bool {
        self.has_tilted
    }

    /// Whether the base-size window with top-left `(x, y)` passes every stage.
    fn accepts(&self, ii: &IntegralImages, x: i64, y: i64) -> bool {
        let (nw, nh) = (self.width as i64 - 2, self.height as i64 - 2);
        let area = (nw * nh) as f64;
        let sum = ii.sum(x + 1, y + 1, nw, nh) as f64;
        let sqsum = ii.sqsum(x + 1, y + 1, nw, nh) as f64;
        let variance = area * sqsum - sum * sum;
        let norm = if variance > 0.0 { 1.0 / variance.sqrt() } else { 1.0 };

        for stage in &self.stages {
            let mut total = 0.0;
            for weak in &stage.weak {
                let mut idx = 0i32;
                loop {
                    let node = &weak.nodes[idx as usize];
                    let value = self.feature_value(&self.features[node.feature], ii, x, y) * norm;
                    idx = if value < node.threshold { node.left } else { node.right };
                    if idx <= 0 {
                        break;
                    }
                }
                total += weak.leaves[(-idx) as usize];
            }
            if total < stage.threshold {
                return false;
            }
        }
        true
    }

    fn feature_value(&self, feature: &Feature, ii: &IntegralImages, x: i64, y: i64) -> f64 {
        feature
            .rects
            .iter()
            .map(|r| {
                let s = if feature.tilted {
                    ii.tilted(x + r.x, y + r.y, r.w, r.h)
                } else {
                    ii.sum(x + r.x, y + r.y, r.w, r.h)
                };
                r.weight * s as f64
            })
            .sum()
    }
}

impl ObjectDetector for HaarCascade {
    fn detect(&self, image: &GrayImage, params: &DetectParams) -> Vec<Rect> {
        let (iw, ih) = image.dimensions();
        if params.scale_factor <= 1.0 || iw < self.width || ih < self.height {
            return Vec::new();
        }
        let (max_w, max_h) = params.max_size.unwrap_or((iw, ih));

        let mut hits = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let win_w = (self.width as f64 * factor).round() as u32;
            let win_h = (self.height as f64 * factor).round() as u32;
            if win_w > max_w.min(iw) || win_h > max_h.min(ih) {
                break;
            }
            let sw = (iw as f64 / factor).round() as u32;
            let sh = (ih as f64 / factor).round() as u32;
            if sw < self.width || sh < self.height {
                break;
            }

            if win_w >= params.min_size.0 && win_h >= params.min_size.1 {
                let ii = if (sw, sh) == (iw, ih) {
                    IntegralImages::new(image, self.has_tilted)
                } else {
                    let scaled = image::imageops::resize(image, sw, sh, FilterType::Triangle);
                    IntegralImages::new(&scaled, self.has_tilted)
                };
                let step = if factor > 2.0 { 1 } else { 2 };
                for y in (0..=(sh - self.height) as i64).step_by(step) {
                    for x in (0..=(sw - self.width) as i64).step_by(step) {
                        if self.accepts(&ii, x, y) {
                            hits.push(Rect::new(
                                (x as f64 * factor).round() as i32,
                                (y as f64 * factor).round() as i32,
                                win_w as i32,
                                win_h as i32,
                            ));
                        }
                    }
                }
            }
            factor *= params.scale_factor;
        }

        log::trace!("Cascade produced {} raw hits", hits.len());
        group_rectangles(&hits, params.min_neighbors, GROUP_EPS)
    }
}

fn parse_numbers(text: &str) -> Result<Vec<f64>, String> {
    text.split_whitespace()
        .map(|t| t.parse::<f64>().map_err(|_| format!("bad number '{t}'")))
        .collect()
}

fn parse_feature(raw: &FeatureXml, win_w: i64, win_h: i64) -> Result<Feature, String> {
    let tilted = raw.tilted != 0;
    let mut rects = Vec::with_capacity(raw.rects.items.len());
    for text in &raw.rects.items {
        let v = parse_numbers(text)?;
        let &[x, y, w, h, weight] = v.as_slice() else {
            return Err(format!("rect '{}' needs 5 values", text.trim()));
        };
        let r = WeightedRect {
            x: x as i64,
            y: y as i64,
            w: w as i64,
            h: h as i64,
            weight,
        };
        let inside = if tilted {
            r.x - r.h >= 0 && r.x + r.w <= win_w && r.y >= 0 && r.y + r.w + r.h <= win_h
        } else {
            r.x >= 0 && r.y >= 0 && r.x + r.w <= win_w && r.y + r.h <= win_h
        };
        if r.w <= 0 || r.h <= 0 || !inside {
            return Err(format!("rect '{}' lies outside the window", text.trim()));
        }
        rects.push(r);
    }
    if rects.is_empty() {
        return Err("feature has no rects".into());
    }
    Ok(Feature { rects, tilted })
}

fn parse_weak(raw: &WeakClassifierXml, feature_count: usize) -> Result<WeakClassifier, String> {
    let values = parse_numbers(&raw.internal_nodes)?;
    if values.is_empty() || values.len() % 4 != 0 {
        return Err("internal nodes must come in groups of 4".into());
    }
    let leaves = parse_numbers(&raw.leaf_values)?;
    let node_count = values.len() / 4;

    let mut nodes = Vec::with_capacity(node_count);
    for (i, chunk) in values.chunks_exact(4).enumerate() {
        let node = Node {
            left: chunk[0] as i32,
            right: chunk[1] as i32,
            feature: chunk[2] as usize,
            threshold: chunk[3],
        };
        if chunk[2] < 0.0 || node.feature >= feature_count {
            return Err(format!("feature index {} out of range", chunk[2]));
        }
        for child in [node.left, node.right] {
            // Children must point forward so evaluation always terminates.
            let valid = if child > 0 {
                (child as usize) > i && (child as usize) < node_count
            } else {
                ((-child) as usize) < leaves.len()
            };
            if !valid {
                return Err(format!("node child {child} out of range"));
            }
        }
        nodes.push(node);
    }
    Ok(WeakClassifier { nodes, leaves })
}

// ---------------------------------------------------------------------------
// Integral images
// ---------------------------------------------------------------------------

/// Summed-area tables over a grayscale image: plain, squared and (optionally)
/// 45° rotated.
///
/// The rotated table follows the usual convention
/// `T(X, Y) = Σ I(x, y) for y < Y, |x - X + 1| <= Y - y - 1`. Its cones
/// spill past the image edges, so it is stored with `height + 1` columns of
/// padding on each side.
struct IntegralImages {
    stride: usize,
    sum: Vec<i64>,
    sqsum: Vec<i64>,
    tilted: Vec<i64>,
    tilted_stride: usize,
    tilted_pad: i64,
}

impl IntegralImages {
    fn new(image: &GrayImage, with_tilted: bool) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0i64; stride * (h + 1)];
        let mut sqsum = vec![0i64; stride * (h + 1)];
        let pixels = image.as_raw();

        for y in 0..h {
            let mut row = 0i64;
            let mut row_sq = 0i64;
            for x in 0..w {
                let p = pixels[y * w + x] as i64;
                row += p;
                row_sq += p * p;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sqsum[(y + 1) * stride + x + 1] = sqsum[y * stride + x + 1] + row_sq;
            }
        }

        let mut integral = Self {
            stride,
            sum,
            sqsum,
            tilted: Vec::new(),
            tilted_stride: 0,
            tilted_pad: 0,
        };
        if with_tilted {
            integral.build_tilted(pixels, w, h);
        }
        integral
    }

    fn build_tilted(&mut self, pixels: &[u8], w: usize, h: usize) {
        let pad = h as i64 + 1;
        let stride = w + 1 + 2 * pad as usize;
        let mut t = vec![0i64; stride * (h + 1)];
        let pixel = |x: i64, y: i64| -> i64 {
            if x < 0 || y < 0 || x >= w as i64 {
                0
            } else {
                pixels[y as usize * w + x as usize] as i64
            }
        };
        let at = |x: i64, y: i64| y as usize * stride + (x + pad) as usize;

        for y in 1..=h as i64 {
            for x in (1 - pad)..(w as i64 + pad) {
                let above2 = if y >= 2 { t[at(x, y - 2)] } else { 0 };
                t[at(x, y)] = t[at(x - 1, y - 1)] + t[at(x + 1, y - 1)] - above2
                    + pixel(x - 1, y - 1)
                    + pixel(x - 1, y - 2);
            }
        }

        self.tilted = t;
        self.tilted_stride = stride;
        self.tilted_pad = pad;
    }

    fn sum(&self, x: i64, y: i64, w: i64, h: i64) -> i64 {
        Self::rect(&self.sum, self.stride, x, y, w, h)
    }

    fn sqsum(&self, x: i64, y: i64, w: i64, h: i64) -> i64 {
        Self::rect(&self.sqsum, self.stride, x, y, w, h)
    }

    fn rect(table: &[i64], stride: usize, x: i64, y: i64, w: i64, h: i64) -> i64 {
        let at = |x: i64, y: i64| table[y as usize * stride + x as usize];
        at(x, y) - at(x + w, y) - at(x, y + h) + at(x + w, y + h)
    }

    /// Sum over the rotated rectangle whose top corner is `(x, y)`, with
    /// sides `w` down-right and `h` down-left.
    fn tilted(&self, x: i64, y: i64, w: i64, h: i64) -> i64 {
        let at = |x: i64, y: i64| {
            self.tilted[y as usize * self.tilted_stride + (x + self.tilted_pad) as usize]
        };
        at(x, y) - at(x - h, y + h) - at(x + w, y + w) + at(x + w - h, y + w + h)
    }

    #[cfg(test)]
    fn tilted_point(&self, x: i64, y: i64) -> i64 {
        self.tilted[y as usize * self.tilted_stride + (x + self.tilted_pad) as usize]
    }
}
