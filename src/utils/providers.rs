//! Execution provider parsing and discovery

use crate::{
    backends::BackendType,
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse an execution provider string in `backend:provider` form
    ///
    /// A bare backend name selects its default provider.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_api::backends::BackendType;
    /// use bgremove_api::config::ExecutionProvider;
    /// use bgremove_api::utils::ExecutionProviderManager;
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda").unwrap();
    /// assert_eq!((backend, provider), (BackendType::Onnx, ExecutionProvider::Cuda));
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract").unwrap();
    /// assert_eq!((backend, provider), (BackendType::Tract, ExecutionProvider::Cpu));
    /// ```
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` for unknown backends or providers
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let Some((backend, provider)) = provider_str.split_once(':') else {
            return match provider_str {
                "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
                "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(BgRemovalError::invalid_config(
                    "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
                )),
            };
        };

        match (backend, provider) {
            ("onnx", "auto") => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
            ("onnx", "cpu") => Ok((BackendType::Onnx, ExecutionProvider::Cpu)),
            ("onnx", "cuda") => Ok((BackendType::Onnx, ExecutionProvider::Cuda)),
            ("onnx", "coreml") => Ok((BackendType::Onnx, ExecutionProvider::CoreMl)),
            ("onnx", other) => Err(BgRemovalError::invalid_config(format!(
                "Unknown ONNX provider: {}. Supported: auto, cpu, cuda, coreml",
                other
            ))),
            ("tract", "cpu") => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            ("tract", other) => Err(BgRemovalError::invalid_config(format!(
                "Unknown Tract provider: {}. Tract only supports 'cpu'",
                other
            ))),
            (other, _) => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend: {}. Supported backends: onnx, tract",
                other
            ))),
        }
    }

    /// All provider combinations with their availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx: Vec<(String, bool, String)> = crate::backends::OnnxBackend::list_providers();
        #[cfg(not(feature = "onnx"))]
        let onnx: Vec<(String, bool, String)> = Vec::new();

        let onnx_available = |name: &str| {
            onnx.iter()
                .any(|(provider, available, _)| provider.eq_ignore_ascii_case(name) && *available)
        };

        for (provider, available, description) in [
            (
                ExecutionProvider::Auto,
                onnx_available("cpu"),
                "ONNX Runtime with auto-selected provider",
            ),
            (ExecutionProvider::Cpu, onnx_available("cpu"), "ONNX Runtime CPU execution"),
            (
                ExecutionProvider::Cuda,
                onnx_available("cuda"),
                "ONNX Runtime CUDA GPU acceleration",
            ),
            (
                ExecutionProvider::CoreMl,
                onnx_available("coreml"),
                "ONNX Runtime CoreML (Apple Silicon) acceleration",
            ),
        ] {
            providers.push(ProviderInfo {
                name: Self::provider_to_string(BackendType::Onnx, provider),
                backend_type: BackendType::Onnx,
                execution_provider: provider,
                available,
                description: description.to_string(),
            });
        }

        providers.push(ProviderInfo {
            name: Self::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: cfg!(feature = "tract"),
            description: "Pure Rust CPU inference via Tract".to_string(),
        });

        providers
    }

    /// Convert backend type and execution provider back to string
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{}:{}", backend_type, provider)
    }
}
