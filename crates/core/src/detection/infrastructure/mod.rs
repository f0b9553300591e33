#[cfg(feature = "onnx")]
pub mod execution_provider;
pub mod haar_cascade;
pub mod math;
#[cfg(feature = "onnx")]
pub mod onnx_yunet_locator;
pub mod strategy_factory;
pub mod yunet_decoder;
