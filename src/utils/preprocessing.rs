//! Image to tensor conversion for segmentation models

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Resize to the model input and normalize into an NCHW tensor
    ///
    /// The image is stretched to `target_size` without preserving aspect
    /// ratio; the mask is stretched back to the original dimensions afterwards.
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` for a zero-sized target
    pub fn preprocess_for_inference(
        image: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [height, width] = preprocessing_config.target_size;
        if height == 0 || width == 0 {
            return Err(BgRemovalError::invalid_config(
                "Model input size must be non-zero",
            ));
        }

        let canvas = if image.dimensions() == (width, height) {
            image.clone()
        } else {
            image::imageops::resize(image, width, height, FilterType::Triangle)
        };

        Ok(Self::canvas_to_tensor(&canvas, preprocessing_config))
    }

    /// Convert an RGB canvas to a normalized `[1, 3, H, W]` tensor
    #[must_use]
    pub fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| {
                let value = canvas.get_pixel(x as u32, y as u32).0.get(channel).copied().unwrap_or(0);
                let mean = mean.get(channel).copied().unwrap_or(0.0);
                let std = std.get(channel).copied().unwrap_or(1.0);
                (f32::from(value) / 255.0 - mean) / std
            },
        )
    }
}
