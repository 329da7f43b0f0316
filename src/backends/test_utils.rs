//! Mock inference backend for testing segmentation without model files

use crate::{
    config::InferenceConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// What the mock writes into its output tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockOutput {
    /// Soft-edged disc of probabilities in `[0, 1]`
    Circle,
    /// Every element set to the given value
    Constant(f32),
}

/// Mock backend for testing
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    preprocessing_config: PreprocessingConfig,
    output: MockOutput,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(64, 64)
    }

    /// Mock with a `[height, width]` model input
    #[must_use]
    pub fn with_size(height: u32, width: u32) -> Self {
        Self {
            initialized: false,
            preprocessing_config: PreprocessingConfig {
                target_size: [height, width],
                ..PreprocessingConfig::default()
            },
            output: MockOutput::Circle,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: MockOutput) -> Self {
        self.output = output;
        self
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Shared handle to the call history, still readable after the mock is boxed
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_output(&self) -> Array4<f32> {
        let (_, _, height, width) = self.output_shape();

        match self.output {
            MockOutput::Constant(value) => Array4::from_elem((1, 1, height, width), value),
            MockOutput::Circle => {
                let center_x = width as f32 / 2.0;
                let center_y = height as f32 / 2.0;
                let radius = (width.min(height) as f32 / 3.0).max(1.0);

                Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
                    let dx = x as f32 - center_x;
                    let dy = y as f32 - center_y;
                    let distance = (dx * dx + dy * dy).sqrt();
                    ((radius - distance) / radius).clamp(0.0, 1.0)
                })
            },
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(150)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(BgRemovalError::inference("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock backend inference failed"));
        }
        if input.dim() != self.input_shape() {
            return Err(BgRemovalError::inference(format!(
                "Unexpected input shape {:?}, expected {:?}",
                input.dim(),
                self.input_shape()
            )));
        }

        Ok(self.generate_output())
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let [height, width] = self.preprocessing_config.target_size;
        (1, 3, height as usize, width as usize)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        let [height, width] = self.preprocessing_config.target_size;
        (1, 1, height as usize, width as usize)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-model".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 1024 * 1024,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls_and_fails_when_asked() {
        let mut backend = MockBackend::new_failing_inference();
        let history = backend.call_history();

        backend.initialize(&InferenceConfig::default()).unwrap();
        let input = Array4::zeros(backend.input_shape());
        assert!(backend.infer(&input).is_err());
        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);

        let mut backend = MockBackend::new_failing_init();
        assert!(backend.initialize(&InferenceConfig::default()).is_err());
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_mock_rejects_wrong_input_shape() {
        let mut backend = MockBackend::with_size(8, 8);
        backend.initialize(&InferenceConfig::default()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
    }

    #[test]
    fn test_mock_circle_output() {
        let mut backend = MockBackend::with_size(30, 30);
        backend.initialize(&InferenceConfig::default()).unwrap();
        let output = backend.infer(&Array4::zeros((1, 3, 30, 30))).unwrap();

        assert_eq!(output.dim(), (1, 1, 30, 30));
        assert!(output[[0, 0, 15, 15]] > 0.9);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
    }
}
