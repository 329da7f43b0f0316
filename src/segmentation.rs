//! Foreground segmentation
//!
//! [`Segmenter`] is the seam between the request pipeline and the model: the
//! pipeline only ever sees an RGB image going in and a full-resolution alpha
//! mask coming out.

use crate::{
    config::InferenceConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::PreprocessingConfig,
    types::SegmentationMask,
    utils::ImagePreprocessor,
};
use image::RgbImage;
use ndarray::Array4;
use std::sync::Mutex;

/// Produces a foreground mask for an image
pub trait Segmenter: Send + Sync {
    /// Segment `image`, returning a mask with the same dimensions
    ///
    /// # Errors
    /// Returns `BgRemovalError::Inference` when the model fails
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask>;

    /// Whether the model is ready to serve requests
    fn is_loaded(&self) -> bool;
}

/// [`Segmenter`] backed by an inference backend
pub struct ModelSegmenter {
    backend: Mutex<Box<dyn InferenceBackend>>,
    preprocessing: PreprocessingConfig,
    apply_sigmoid: bool,
    loaded: bool,
}

impl std::fmt::Debug for ModelSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSegmenter")
            .field("preprocessing", &self.preprocessing)
            .field("apply_sigmoid", &self.apply_sigmoid)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl ModelSegmenter {
    /// Initialize `backend` and wrap it for shared use
    ///
    /// # Errors
    /// - Backend initialization fails
    /// - Preprocessing configuration unavailable
    pub fn new(mut backend: Box<dyn InferenceBackend>, config: &InferenceConfig) -> Result<Self> {
        if let Some(load_time) = backend.initialize(config)? {
            tracing::info!(load_ms = load_time.as_millis() as u64, "Model initialized");
        }
        let preprocessing = backend.get_preprocessing_config()?;
        let loaded = backend.is_initialized();

        Ok(Self {
            backend: Mutex::new(backend),
            preprocessing,
            apply_sigmoid: config.apply_sigmoid,
            loaded,
        })
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    /// Convert the first output channel into an 8-bit mask at model resolution
    ///
    /// # Errors
    /// Returns `BgRemovalError::Inference` for an empty output tensor
    pub fn tensor_to_mask(output: &Array4<f32>, apply_sigmoid: bool) -> Result<SegmentationMask> {
        let (batch, channels, height, width) = output.dim();
        if batch == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(BgRemovalError::inference(format!(
                "Model returned an empty mask tensor {:?}",
                output.dim()
            )));
        }

        let data = output
            .slice(ndarray::s![0, 0, .., ..])
            .iter()
            .map(|&value| {
                let probability = if apply_sigmoid {
                    1.0 / (1.0 + (-value).exp())
                } else {
                    value
                };
                (probability.clamp(0.0, 1.0) * 255.0).round() as u8
            })
            .collect();

        Ok(SegmentationMask::new(data, (width as u32, height as u32)))
    }
}

impl Segmenter for ModelSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        let input = ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;

        let output = {
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| BgRemovalError::inference("Inference backend lock poisoned"))?;
            backend.infer(&input)?
        };

        let mask = Self::tensor_to_mask(&output, self.apply_sigmoid)?;
        mask.resize(width, height)
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
