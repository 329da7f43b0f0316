//! Core types for a single removal request

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::{imageops::FilterType, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Field carrying an uploaded file part
pub const FIELD_IMAGE_FILE: &str = "image_file";
/// Field carrying a base64 encoded image
pub const FIELD_IMAGE_FILE_B64: &str = "image_file_b64";
/// Field carrying a remote image URL
pub const FIELD_IMAGE_URL: &str = "image_url";
/// Optional output size token
pub const FIELD_SIZE: &str = "size";
/// Optional output format token
pub const FIELD_FORMAT: &str = "format";

/// One image input channel, in descending priority order
///
/// Borrows from the request payload it was selected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Raw bytes of an uploaded file part
    FileUpload(&'a [u8]),
    /// Base64 text, optionally with a `data:` URI prefix
    Base64Payload(&'a str),
    /// `http`/`https` URL to fetch the image from
    RemoteUrl(&'a str),
}

impl ImageSource<'_> {
    /// Name of the request field this source came from
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::FileUpload(_) => FIELD_IMAGE_FILE,
            Self::Base64Payload(_) => FIELD_IMAGE_FILE_B64,
            Self::RemoteUrl(_) => FIELD_IMAGE_URL,
        }
    }
}

/// Decoded input image, normalized to 3-channel RGB
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub image: RgbImage,
    /// Field the image was read from
    pub channel: &'static str,
}

impl ResolvedImage {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Segmentation mask result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255), row major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create a mask with every pixel set to `value`
    #[must_use]
    pub fn filled(dimensions: (u32, u32), value: u8) -> Self {
        let len = dimensions.0 as usize * dimensions.1 as usize;
        Self::new(vec![value; len], dimensions)
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: GrayImage) -> Self {
        let dimensions = image.dimensions();
        Self::new(image.into_raw(), dimensions)
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// Returns `BgRemovalError::Internal` when the buffer length does not match the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            BgRemovalError::internal(format!(
                "Mask buffer of {} bytes does not match {}x{}",
                self.data.len(),
                width,
                height
            ))
        })
    }

    /// Resample the mask to new dimensions with a Lanczos3 filter
    ///
    /// # Errors
    /// Returns `BgRemovalError::Internal` for inconsistent mask buffers
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<Self> {
        if self.dimensions == (new_width, new_height) {
            return Ok(self.clone());
        }
        let resized =
            image::imageops::resize(&self.to_image()?, new_width, new_height, FilterType::Lanczos3);
        Ok(Self::from_image(resized))
    }

    /// Share of pixels whose value is at least 128
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&value| value >= 128).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Encoded response body for a removal request
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// Pixel dimensions of the encoded image
    pub dimensions: (u32, u32),
}

impl EncodedImage {
    /// `Content-Type` for the encoded bytes
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Detailed timing breakdown for one removal request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Source lookup, optional fetch and image decode
    pub resolve_ms: u64,

    /// Waiting for an inference slot plus the segmentation call
    pub inference_ms: u64,

    /// Alpha compositing and optional output resize
    pub postprocessing_ms: u64,

    /// Final PNG/JPEG encoding
    pub encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of the total spent in inference
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_image_source_channels() {
        assert_eq!(ImageSource::FileUpload(&[1]).channel(), "image_file");
        assert_eq!(ImageSource::Base64Payload("").channel(), "image_file_b64");
        assert_eq!(ImageSource::RemoteUrl("https://x").channel(), "image_url");
    }

    #[test]
    fn test_mask_image_round_trip() {
        let mut gray = GrayImage::new(3, 2);
        gray.put_pixel(2, 1, Luma([200]));
        let mask = SegmentationMask::from_image(gray.clone());
        assert_eq!(mask.dimensions, (3, 2));
        assert_eq!(mask.to_image().unwrap(), gray);
    }

    #[test]
    fn test_mask_with_bad_buffer_is_rejected() {
        let mask = SegmentationMask::new(vec![0; 5], (3, 2));
        assert!(mask.to_image().is_err());
    }

    #[test]
    fn test_mask_resize_keeps_uniform_values() {
        let mask = SegmentationMask::filled((64, 64), 255);
        let resized = mask.resize(100, 30).unwrap();
        assert_eq!(resized.dimensions, (100, 30));
        assert_eq!(resized.data.len(), 3000);
        assert!(resized.data.iter().all(|&value| value == 255));
    }

    #[test]
    fn test_foreground_ratio() {
        let mask = SegmentationMask::new(vec![0, 0, 255, 130], (2, 2));
        assert!((mask.foreground_ratio() - 0.5).abs() < f32::EPSILON);
        assert_eq!(SegmentationMask::new(vec![], (0, 0)).foreground_ratio(), 0.0);
    }

    #[test]
    fn test_timings_ratio() {
        let timings = ProcessingTimings {
            inference_ms: 50,
            total_ms: 200,
            ..ProcessingTimings::new()
        };
        assert!((timings.inference_ratio() - 0.25).abs() < f64::EPSILON);
        assert_eq!(ProcessingTimings::new().inference_ratio(), 0.0);
    }
}
