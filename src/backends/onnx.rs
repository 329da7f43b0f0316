//! ONNX Runtime backend
//!
//! Supports CPU, CUDA and `CoreML` execution providers. Requested accelerators
//! that are not available fall back to CPU with a warning.

use crate::config::{ExecutionProvider, InferenceConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;
use std::num::NonZeroUsize;

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers as `(name, available, description)`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available = CUDAExecutionProvider::default().is_available().unwrap_or(false);
        let coreml_available = CoreMLExecutionProvider::default()
            .is_available()
            .unwrap_or(false);
        log::debug!(
            "ONNX Runtime providers on {}/{}: cuda={}, coreml={}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            cuda_available,
            coreml_available
        );

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    #[must_use]
    pub fn new(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
        }
    }

    /// Execution providers to register for the requested provider
    fn select_providers(provider: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = || {
            let cuda = CUDAExecutionProvider::default();
            cuda.is_available().unwrap_or(false).then(|| cuda.build())
        };
        let coreml = || {
            let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
            coreml.is_available().unwrap_or(false).then(|| coreml.build())
        };

        let providers: Vec<ExecutionProviderDispatch> = match provider {
            ExecutionProvider::Auto => cuda().into_iter().chain(coreml()).collect(),
            ExecutionProvider::Cpu => Vec::new(),
            ExecutionProvider::Cuda => cuda().into_iter().collect(),
            ExecutionProvider::CoreMl => coreml().into_iter().collect(),
        };

        match (provider, providers.is_empty()) {
            (ExecutionProvider::Cpu, _) => log::info!("Using CPU execution provider"),
            (ExecutionProvider::Auto, true) => {
                log::warn!("No hardware acceleration available, falling back to CPU");
            },
            (_, true) => log::warn!(
                "{} execution provider requested but not available, falling back to CPU",
                provider
            ),
            (_, false) => log::info!(
                "Hardware acceleration enabled with {} provider(s)",
                providers.len()
            ),
        }

        providers
    }

    fn thread_counts(config: &InferenceConfig) -> (usize, usize) {
        let cores = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(8);
        let intra = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };
        (intra, inter)
    }

    fn build_session(config: &InferenceConfig, model_data: &[u8]) -> Result<Session> {
        let session_error = |stage: &str, e: ort::Error| {
            BgRemovalError::model(format!("Failed to {}: {}", stage, e))
        };

        let mut builder: SessionBuilder = Session::builder()
            .map_err(|e| session_error("create session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| session_error("set optimization level", e))?;

        let providers = Self::select_providers(config.execution_provider);
        if !providers.is_empty() {
            builder = builder
                .with_execution_providers(providers)
                .map_err(|e| session_error("register execution providers", e))?;
        }

        let (intra_threads, inter_threads) = Self::thread_counts(config);
        log::debug!(
            "Threading: {} intra-op threads, {} inter-op threads",
            intra_threads,
            inter_threads
        );

        builder
            .with_parallel_execution(true)
            .map_err(|e| session_error("enable parallel execution", e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| session_error("set intra threads", e))?
            .with_inter_threads(inter_threads)
            .map_err(|e| session_error("set inter threads", e))?
            .commit_from_memory(model_data)
            .map_err(|e| session_error("create session from model data", e))
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }

        let start = Instant::now();
        let model_data = self.model_manager.load_model()?;
        let info = self.model_manager.get_info()?;
        self.session = Some(Self::build_session(config, &model_data)?);

        let load_time = start.elapsed();
        log::info!(
            "ONNX model {} ({}, {:.2} MB) loaded in {:.0}ms",
            info.name,
            info.precision,
            info.size_bytes as f64 / (1024.0 * 1024.0),
            load_time.as_secs_f64() * 1000.0
        );
        Ok(Some(load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::inference("ONNX session not initialized"))?;

        let start = Instant::now();
        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional input and output: export names differ between models
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
            })?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| BgRemovalError::inference(format!("Expected 4D output tensor: {e}")))?;

        log::debug!(
            "ONNX inference {:?} -> {:?} in {:.2}ms",
            input.dim(),
            output.dim(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .get_info()
            .map_or((1, 3, 1024, 1024), |info| info.input_shape)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .get_info()
            .map_or((1, 1, 1024, 1024), |info| info.output_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(all(test, feature = "onnx"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_providers_always_includes_cpu() {
        let providers = OnnxBackend::list_providers();
        assert_eq!(providers.len(), 3);
        assert!(providers
            .iter()
            .any(|(name, available, _)| name == "CPU" && *available));
    }

    #[test]
    fn test_thread_counts() {
        let config = InferenceConfig {
            intra_threads: 3,
            inter_threads: 2,
            ..InferenceConfig::default()
        };
        assert_eq!(OnnxBackend::thread_counts(&config), (3, 2));

        let (intra, inter) = OnnxBackend::thread_counts(&InferenceConfig::default());
        assert!(intra >= 1);
        assert!(inter >= 1);
    }

    #[test]
    fn test_invalid_model_fails_initialization() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not a model").unwrap();

        let mut backend = OnnxBackend::new(ModelManager::from_path(&path, None).unwrap());
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 1024, 1024));

        let config = InferenceConfig {
            execution_provider: ExecutionProvider::Cpu,
            ..InferenceConfig::default()
        };
        assert!(backend.initialize(&config).is_err());
        assert!(!backend.is_initialized());
        assert!(backend.infer(&Array4::zeros((1, 3, 1024, 1024))).is_err());
    }
}
