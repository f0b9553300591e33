use crate::detection::domain::detection_strategy::{DetectionStrategy, StrategyKind};
use crate::detection::domain::face_locator::{CascadeFaceLocator, FaceLocator, FallbackFaceLocator};
use crate::shared::asset_resolver::{Asset, AssetError, AssetResolver};
use crate::shared::settings::DetectionSettings;

use super::haar_cascade::HaarCascade;

/// Builds the detection strategy named in `settings`, loading every asset it
/// needs up front.
///
/// All failures are construction-time: a missing or malformed cascade, a
/// model that will not load, or a model-backed strategy in a build without
/// the `onnx` feature.
pub fn create_strategy(
    settings: &DetectionSettings,
    resolver: &AssetResolver,
) -> Result<DetectionStrategy, AssetError> {
    let kind = settings.strategy;
    if kind.needs_face_model() && !cfg!(feature = "onnx") {
        return Err(AssetError::BackendUnavailable("onnx"));
    }

    let eyes = HaarCascade::load(&resolver.resolve(Asset::EyeCascade)?)?;
    if eyes.has_tilted_features() {
        log::debug!("Eye cascade uses tilted features");
    }

    let faces: Box<dyn FaceLocator> = match kind {
        StrategyKind::Cascade => cascade_locator(settings, resolver)?,
        StrategyKind::Dnn => model_locator(settings, resolver)?,
        StrategyKind::Hybrid => Box::new(FallbackFaceLocator::new(
            model_locator(settings, resolver)?,
            cascade_locator(settings, resolver)?,
        )),
    };

    log::info!(
        "Using {kind} detection (eye areas: {:?})",
        settings.eye_area_mode()
    );
    Ok(DetectionStrategy::new(
        kind,
        faces,
        Box::new(eyes),
        settings.eye_area_mode(),
        settings.eye_cascade.params(),
        settings.max_eye_ratio,
    ))
}

fn cascade_locator(
    settings: &DetectionSettings,
    resolver: &AssetResolver,
) -> Result<Box<dyn FaceLocator>, AssetError> {
    let cascade = HaarCascade::load(&resolver.resolve(Asset::FaceCascade)?)?;
    Ok(Box::new(CascadeFaceLocator::new(
        Box::new(cascade),
        settings.face_cascade.params(),
    )))
}

#[cfg(feature = "onnx")]
fn model_locator(
    settings: &DetectionSettings,
    resolver: &AssetResolver,
) -> Result<Box<dyn FaceLocator>, AssetError> {
    let path = resolver.resolve(Asset::FaceModel)?;
    let locator = super::onnx_yunet_locator::OnnxYunetLocator::new(
        &path,
        settings.dnn.yunet_params(),
        settings.dnn.input_scale,
        settings.dnn.device,
    )?;
    Ok(Box::new(locator))
}

#[cfg(not(feature = "onnx"))]
fn model_locator(
    _settings: &DetectionSettings,
    _resolver: &AssetResolver,
) -> Result<Box<dyn FaceLocator>, AssetError> {
    Err(AssetError::BackendUnavailable("onnx"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::{EYE_CASCADE_NAME, FACE_CASCADE_NAME};
    use std::path::Path;

    const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/edge_cascade.xml");

    fn asset_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            std::fs::copy(FIXTURE, dir.path().join(name)).unwrap();
        }
        dir
    }

    fn resolver(dir: &Path) -> AssetResolver {
        AssetResolver::new(Some(dir)).with_cache_dir(None)
    }

    fn settings(strategy: StrategyKind) -> DetectionSettings {
        DetectionSettings {
            strategy,
            ..DetectionSettings::default()
        }
    }

    #[test]
    fn test_cascade_strategy_builds() {
        let dir = asset_dir(&[FACE_CASCADE_NAME, EYE_CASCADE_NAME]);
        let strategy = create_strategy(&settings(StrategyKind::Cascade), &resolver(dir.path())).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Cascade);
    }

    #[test]
    fn test_missing_eye_cascade_is_fatal() {
        let dir = asset_dir(&[FACE_CASCADE_NAME]);
        let err = create_strategy(&settings(StrategyKind::Cascade), &resolver(dir.path()))
            .err()
            .unwrap();
        assert!(matches!(err, AssetError::Missing { ref name, .. } if name == EYE_CASCADE_NAME));
    }

    #[test]
    fn test_missing_face_cascade_is_fatal() {
        let dir = asset_dir(&[EYE_CASCADE_NAME]);
        let err = create_strategy(&settings(StrategyKind::Cascade), &resolver(dir.path()))
            .err()
            .unwrap();
        assert!(matches!(err, AssetError::Missing { ref name, .. } if name == FACE_CASCADE_NAME));
    }

    #[test]
    fn test_malformed_cascade_is_fatal() {
        let dir = asset_dir(&[FACE_CASCADE_NAME]);
        std::fs::write(dir.path().join(EYE_CASCADE_NAME), "<opencv_storage/>").unwrap();
        let err = create_strategy(&settings(StrategyKind::Cascade), &resolver(dir.path()))
            .err()
            .unwrap();
        assert!(matches!(err, AssetError::MalformedCascade { .. }));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_dnn_without_model_is_fatal() {
        let dir = asset_dir(&[FACE_CASCADE_NAME, EYE_CASCADE_NAME]);
        let err = create_strategy(&settings(StrategyKind::Dnn), &resolver(dir.path()))
            .err()
            .unwrap();
        assert!(matches!(err, AssetError::Missing { .. }));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_model_strategies_need_onnx_backend() {
        let dir = asset_dir(&[FACE_CASCADE_NAME, EYE_CASCADE_NAME]);
        for kind in [StrategyKind::Dnn, StrategyKind::Hybrid] {
            let err = create_strategy(&settings(kind), &resolver(dir.path())).err().unwrap();
            assert!(matches!(err, AssetError::BackendUnavailable("onnx")));
        }
    }
}
