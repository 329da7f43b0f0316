//! Model location and preprocessing metadata
//!
//! A model is either a single `.onnx` file or a directory in the `HuggingFace`
//! export layout:
//!
//! ```text
//! BiRefNet-ONNX/
//! ├── preprocessor_config.json   (optional)
//! └── onnx/
//!     ├── model.onnx             (fp32)
//!     └── model_fp16.onnx        (fp16)
//! ```

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Input resolution of BiRefNet-class models
pub const DEFAULT_INPUT_SIZE: u32 = 1024;

/// `ImageNet` channel means
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// `ImageNet` channel standard deviations
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Candidate model files per variant, searched in order
const VARIANT_FILES: &[(&str, &[&str])] = &[
    ("fp32", &["onnx/model.onnx", "model.onnx"]),
    ("fp16", &["onnx/model_fp16.onnx", "model_fp16.onnx"]),
];

const PREPROCESSOR_CONFIG: &str = "preprocessor_config.json";

/// Where the model comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Local `.onnx` file or model directory
    External(PathBuf),
    /// Remote `.onnx` file or `HuggingFace` repository, cached on first use
    Url(String),
}

impl ModelSource {
    /// Interpret a command-line model argument
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::External(PathBuf::from(value))
        }
    }

    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::External(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            Self::Url(url) => format!("url:{}", url),
        }
    }
}

/// Complete model specification including source and optional variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    /// `fp32` or `fp16`; only consulted for model directories
    pub variant: Option<String>,
}

/// Image normalization expected by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input `[height, width]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: [DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: u64,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Resolved model file plus its preprocessing configuration
#[derive(Debug, Clone)]
pub struct ModelManager {
    name: String,
    model_path: PathBuf,
    precision: String,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Locate a model on disk
    ///
    /// # Errors
    /// - Path does not exist
    /// - Unknown variant, or no model file for the requested variant in a directory
    /// - Unreadable or invalid `preprocessor_config.json`
    pub fn from_path<P: AsRef<Path>>(path: P, variant: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(variant) = variant {
            if !VARIANT_FILES.iter().any(|(name, _)| *name == variant) {
                return Err(BgRemovalError::invalid_config(format!(
                    "Unknown model variant '{}'. Supported: fp32, fp16",
                    variant
                )));
            }
        }

        if path.is_file() {
            return Self::from_file(path);
        }
        if path.is_dir() {
            return Self::from_directory(path, variant);
        }

        Err(BgRemovalError::model(format!(
            "Model path does not exist: {}",
            path.display()
        )))
    }

    /// Build a manager from a [`ModelSpec`] whose source is already local
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` for URL sources, otherwise see [`Self::from_path`]
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        match &spec.source {
            ModelSource::External(path) => Self::from_path(path, spec.variant.as_deref()),
            ModelSource::Url(url) => Err(BgRemovalError::invalid_config(format!(
                "Model URL must be downloaded before loading: {}",
                url
            ))),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        if path.extension().and_then(|ext| ext.to_str()) != Some("onnx") {
            log::warn!(
                "Model file {} does not have an .onnx extension",
                path.display()
            );
        }

        let file_name = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
        let precision = if file_name.contains("fp16") { "fp16" } else { "fp32" };

        Ok(Self {
            name: file_name,
            model_path: path.to_path_buf(),
            precision: precision.to_string(),
            preprocessing: PreprocessingConfig::default(),
        })
    }

    fn from_directory(dir: &Path, variant: Option<&str>) -> Result<Self> {
        let (precision, model_path) = Self::resolve_variant(dir, variant)?;

        let preprocessor_path = dir.join(PREPROCESSOR_CONFIG);
        let preprocessing = if preprocessor_path.is_file() {
            let content = fs::read_to_string(&preprocessor_path).map_err(|e| {
                BgRemovalError::file_io_error("read preprocessor config", &preprocessor_path, &e)
            })?;
            Self::parse_preprocessor_config(&content)?
        } else {
            log::debug!(
                "No {} in {}, using default preprocessing",
                PREPROCESSOR_CONFIG,
                dir.display()
            );
            PreprocessingConfig::default()
        };

        let name = dir
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self {
            name,
            model_path,
            precision: precision.to_string(),
            preprocessing,
        })
    }

    /// Find the model file for `variant`, or the first available one when unset
    fn resolve_variant(dir: &Path, variant: Option<&str>) -> Result<(&'static str, PathBuf)> {
        for (name, candidates) in VARIANT_FILES {
            if variant.is_some_and(|requested| requested != *name) {
                continue;
            }
            if let Some(found) = candidates
                .iter()
                .map(|candidate| dir.join(candidate))
                .find(|candidate| candidate.is_file())
            {
                return Ok((name, found));
            }
        }

        Err(BgRemovalError::model(format!(
            "No {} model file found in {} (looked for onnx/model.onnx, onnx/model_fp16.onnx, model.onnx)",
            variant.unwrap_or("ONNX"),
            dir.display()
        )))
    }

    /// Parse a `HuggingFace` `preprocessor_config.json`
    ///
    /// Missing keys keep their defaults. Means and deviations given on a
    /// 0-255 scale are rescaled to 0-1.
    fn parse_preprocessor_config(content: &str) -> Result<PreprocessingConfig> {
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            BgRemovalError::invalid_config(format!("Failed to parse {}: {}", PREPROCESSOR_CONFIG, e))
        })?;
        let mut config = PreprocessingConfig::default();

        if let Some(size) = value.get("size") {
            config.target_size = Self::parse_size(size)?;
        }
        if let Some(mean) = value.get("image_mean") {
            config.normalization_mean = Self::parse_triplet(mean, "image_mean")?;
        }
        if let Some(std) = value.get("image_std") {
            config.normalization_std = Self::parse_triplet(std, "image_std")?;
            if config.normalization_std.iter().any(|v| *v <= 0.0) {
                return Err(BgRemovalError::invalid_config(
                    "image_std values must be positive",
                ));
            }
        }

        Ok(config)
    }

    fn parse_size(size: &serde_json::Value) -> Result<[u32; 2]> {
        let to_u32 = |value: Option<u64>, key: &str| -> Result<u32> {
            value
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(format!("Invalid {} in size config", key))
                })
        };

        if let Some(edge) = size.as_u64() {
            let edge = to_u32(Some(edge), "size")?;
            return Ok([edge, edge]);
        }

        let height = to_u32(size.get("height").and_then(serde_json::Value::as_u64), "height")?;
        let width = to_u32(size.get("width").and_then(serde_json::Value::as_u64), "width")?;
        Ok([height, width])
    }

    fn parse_triplet(value: &serde_json::Value, key: &str) -> Result<[f32; 3]> {
        let values: Vec<f64> = value
            .as_array()
            .map(|items| items.iter().filter_map(serde_json::Value::as_f64).collect())
            .unwrap_or_default();

        let [a, b, c] = values.as_slice() else {
            return Err(BgRemovalError::invalid_config(format!(
                "{} must be an array of 3 numbers",
                key
            )));
        };

        let scale = if [a, b, c].iter().any(|v| **v > 1.0) { 255.0 } else { 1.0 };
        Ok([(a / scale) as f32, (b / scale) as f32, (c / scale) as f32])
    }

    /// Load model data
    ///
    /// # Errors
    /// Returns `BgRemovalError::Io` when the model file cannot be read
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("read model file", &self.model_path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// Returns `BgRemovalError::Io` when the model file metadata cannot be read
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("inspect model file", &self.model_path, &e))?
            .len();
        let [height, width] = self.preprocessing.target_size;

        Ok(ModelInfo {
            name: self.name.clone(),
            precision: self.precision.clone(),
            size_bytes,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// Infallible for resolved models; kept fallible for backend trait symmetry
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}
