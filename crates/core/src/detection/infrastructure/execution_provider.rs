use ort::execution_providers::ExecutionProviderDispatch;

use crate::shared::settings::InferenceDevice;

/// Name of the accelerator `InferenceDevice::Auto` asks for on this platform.
const ACCELERATOR: Option<&str> = if cfg!(target_os = "macos") {
    Some("CoreML")
} else if cfg!(target_os = "windows") {
    Some("DirectML")
} else {
    None
};

/// Providers to register on the YuNet session for `device`.
///
/// ONNX Runtime always keeps CPU as the last resort, so `Cpu` registers
/// nothing and an accelerator that fails to register is skipped.
pub fn session_providers(device: InferenceDevice) -> Vec<ExecutionProviderDispatch> {
    match device {
        InferenceDevice::Cpu => Vec::new(),
        InferenceDevice::Auto => platform_accelerator().into_iter().collect(),
    }
}

/// Providers the session will try, in order, as a log label.
pub fn provider_chain(device: InferenceDevice) -> String {
    let accelerator = match device {
        InferenceDevice::Auto => ACCELERATOR,
        InferenceDevice::Cpu => None,
    };
    accelerator
        .into_iter()
        .chain(std::iter::once("CPU"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(target_os = "macos")]
fn platform_accelerator() -> Option<ExecutionProviderDispatch> {
    Some(ort::execution_providers::CoreMLExecutionProvider::default().build())
}

#[cfg(target_os = "windows")]
fn platform_accelerator() -> Option<ExecutionProviderDispatch> {
    Some(ort::execution_providers::DirectMLExecutionProvider::default().build())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_accelerator() -> Option<ExecutionProviderDispatch> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_registers_nothing() {
        assert!(session_providers(InferenceDevice::Cpu).is_empty());
        assert_eq!(provider_chain(InferenceDevice::Cpu), "CPU");
    }

    #[test]
    fn test_auto_tries_the_platform_accelerator_first() {
        let expected = usize::from(ACCELERATOR.is_some());
        assert_eq!(session_providers(InferenceDevice::Auto).len(), expected);

        let chain = provider_chain(InferenceDevice::Auto);
        assert!(chain.ends_with("CPU"));
        if let Some(name) = ACCELERATOR {
            assert!(chain.starts_with(name));
        }
    }
}
