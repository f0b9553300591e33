/// YuNet face locator using ONNX Runtime via `ort`.
///
/// The frame is downscaled by `input_scale`, padded to the model's stride
/// grid, run through the network and decoded by `yunet_decoder`. Faces and
/// eye landmarks are mapped back to frame coordinates.
use std::path::Path;

use image::GrayImage;

use crate::detection::domain::face_locator::{FaceCandidate, FaceLocator};
use crate::shared::asset_resolver::AssetError;
use crate::shared::frame::Frame;
use crate::shared::settings::InferenceDevice;

use super::execution_provider::{provider_chain, session_providers};
use super::yunet_decoder::{self, StrideOutputs, YunetParams, STRIDES};

/// YuNet face locator backed by an ONNX Runtime session.
pub struct OnnxYunetLocator {
    session: ort::session::Session,
    params: YunetParams,
    input_scale: f64,
    /// `(width, height)` when the model was exported with a fixed input.
    fixed_input: Option<(u32, u32)>,
}

impl OnnxYunetLocator {
    pub fn new(
        model_path: &Path,
        params: YunetParams,
        input_scale: f64,
        device: InferenceDevice,
    ) -> Result<Self, AssetError> {
        let model_err = |reason: String| AssetError::Model {
            path: model_path.to_path_buf(),
            reason,
        };
        let session = ort::session::Session::builder()
            .map_err(|e| model_err(e.to_string()))?
            .with_execution_providers(session_providers(device))
            .map_err(|e| model_err(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| model_err(e.to_string()))?;

        // NCHW; dynamic dimensions are reported as -1.
        let fixed_input = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                (shape.len() >= 4 && shape[2] > 0 && shape[3] > 0)
                    .then(|| (shape[3] as u32, shape[2] as u32))
            } else {
                None
            }
        });

        log::info!(
            "Loaded YuNet model {} (input {}, providers {})",
            model_path.display(),
            fixed_input.map_or_else(|| "dynamic".to_string(), |(w, h)| format!("{w}x{h}")),
            provider_chain(device)
        );

        Ok(Self {
            session,
            params,
            input_scale,
            fixed_input,
        })
    }
}

impl FaceLocator for OnnxYunetLocator {
    fn locate(
        &mut self,
        frame: &Frame,
        _gray: &GrayImage,
    ) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let input = prepare_input(frame, self.input_scale, self.fixed_input);

        let value = ort::value::Tensor::from_array(input.tensor)?;
        let outputs = self.session.run(ort::inputs![value])?;

        let mut heads: Vec<(usize, [Vec<f32>; 4])> = Vec::with_capacity(STRIDES.len());
        for stride in STRIDES {
            let fetch = |prefix: &str| -> Result<Vec<f32>, Box<dyn std::error::Error>> {
                let name = format!("{prefix}_{stride}");
                let value = outputs
                    .get(name.as_str())
                    .ok_or_else(|| format!("YuNet model has no output {name}"))?;
                Ok(value.try_extract_array::<f32>()?.iter().copied().collect())
            };
            heads.push((stride, [fetch("cls")?, fetch("obj")?, fetch("bbox")?, fetch("kps")?]));
        }
        let views: Vec<StrideOutputs<'_>> = heads
            .iter()
            .map(|(stride, [cls, obj, bbox, kps])| StrideOutputs {
                stride: *stride,
                cls,
                obj,
                bbox,
                kps,
            })
            .collect();

        let faces = yunet_decoder::decode(&views, input.width, input.height, &self.params);
        Ok(faces
            .into_iter()
            .map(|face| FaceCandidate {
                rect: face.rect.unscale(input.scale),
                landmarks: face.landmarks.map(|l| l.unscale(input.scale)),
                score: face.score,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct PreparedInput {
    tensor: ndarray::Array4<f32>,
    /// Frame-to-input scale; divide model coordinates by it.
    scale: f64,
    /// Tensor width and height; the decode grid is laid over these.
    width: u32,
    height: u32,
}

/// Scales the frame and copies it into a zero-padded BGR NCHW tensor with
/// raw 0..255 values. The image sits at the top-left corner so the mapping
/// back is a plain division.
fn prepare_input(frame: &Frame, input_scale: f64, fixed: Option<(u32, u32)>) -> PreparedInput {
    let mut scaled = frame.scaled(input_scale);
    let mut scale = scaled.width() as f64 / frame.width() as f64;

    let (tensor_w, tensor_h) = match fixed {
        Some((fw, fh)) => {
            let fit = (fw as f64 / scaled.width() as f64).min(fh as f64 / scaled.height() as f64);
            if (fit - 1.0).abs() > f64::EPSILON {
                let w = ((scaled.width() as f64 * fit).round() as u32).clamp(1, fw);
                let h = ((scaled.height() as f64 * fit).round() as u32).clamp(1, fh);
                scaled = scaled.resized(w, h);
                scale = w as f64 / frame.width() as f64;
            }
            (fw, fh)
        }
        None => yunet_decoder::padded_size(scaled.width(), scaled.height()),
    };

    let (w, h) = (scaled.width() as usize, scaled.height() as usize);
    let ch = scaled.channels().max(1) as usize;
    let data = scaled.data();
    let mut tensor =
        ndarray::Array4::<f32>::zeros((1, 3, tensor_h as usize, tensor_w as usize));
    for y in 0..h {
        for x in 0..w {
            let px = &data[(y * w + x) * ch..(y * w + x + 1) * ch];
            for c in 0..3 {
                tensor[[0, c, y, x]] = px[c.min(ch - 1)] as f32;
            }
        }
    }

    PreparedInput {
        tensor,
        scale,
        width: tensor_w,
        height: tensor_h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bgr_frame(width: u32, height: u32, bgr: [u8; 3]) -> Frame {
        let data = bgr.repeat((width * height) as usize);
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_dynamic_input_is_scaled_and_padded() {
        let input = prepare_input(&bgr_frame(200, 100, [10, 20, 30]), 0.5, None);
        assert_eq!(input.tensor.shape(), &[1, 3, 64, 128]);
        assert_eq!((input.width, input.height), (128, 64));
        assert_relative_eq!(input.scale, 0.5);
    }

    #[test]
    fn test_channels_stay_bgr_and_unnormalised() {
        let input = prepare_input(&bgr_frame(64, 64, [10, 20, 30]), 1.0, None);
        assert_relative_eq!(input.tensor[[0, 0, 5, 5]], 10.0);
        assert_relative_eq!(input.tensor[[0, 1, 5, 5]], 20.0);
        assert_relative_eq!(input.tensor[[0, 2, 5, 5]], 30.0);
    }

    #[test]
    fn test_padding_is_zero() {
        let input = prepare_input(&bgr_frame(40, 40, [255, 255, 255]), 1.0, None);
        assert_relative_eq!(input.tensor[[0, 0, 39, 39]], 255.0);
        assert_relative_eq!(input.tensor[[0, 0, 63, 63]], 0.0);
    }

    #[test]
    fn test_fixed_input_fits_inside_model_size() {
        let input = prepare_input(&bgr_frame(400, 200, [1, 2, 3]), 0.5, Some((320, 320)));
        assert_eq!(input.tensor.shape(), &[1, 3, 320, 320]);
        assert_eq!((input.width, input.height), (320, 320));
        assert_relative_eq!(input.tensor[[0, 2, 159, 319]], 3.0);
        assert_relative_eq!(input.tensor[[0, 2, 160, 0]], 0.0);
        assert_relative_eq!(input.scale, 0.8);
    }
}
