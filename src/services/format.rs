//! Output format handling service
//!
//! Token normalization is kept apart from encoding: `resolve_format` never
//! fails, and unsupported tokens are only rejected when the format is applied.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Format used when the client does not ask for one
pub const DEFAULT_FORMAT_TOKEN: &str = "png";

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Normalize a requested format token
    ///
    /// Absent or empty tokens become `"png"`; anything else is lowercased and
    /// passed through without validation.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_api::services::OutputFormatHandler;
    ///
    /// assert_eq!(OutputFormatHandler::resolve_format(None), "png");
    /// assert_eq!(OutputFormatHandler::resolve_format(Some("JPG")), "jpg");
    /// assert_eq!(OutputFormatHandler::resolve_format(Some("Zip")), "zip");
    /// ```
    #[must_use]
    pub fn resolve_format(token: Option<&str>) -> String {
        match token {
            Some(token) if !token.is_empty() => token.to_lowercase(),
            _ => DEFAULT_FORMAT_TOKEN.to_string(),
        }
    }

    /// Map a resolved token onto a supported encoding
    ///
    /// # Errors
    /// Returns `BgRemovalError::UnsupportedFormat` for anything other than `png`
    /// or `jpg`. `zip` is recognized but has no encoder.
    pub fn parse_format(token: &str) -> Result<OutputFormat> {
        match token {
            "png" => Ok(OutputFormat::Png),
            "jpg" => Ok(OutputFormat::Jpeg),
            "zip" => Err(BgRemovalError::unsupported_format(
                "zip output is not implemented; use png or jpg",
            )),
            other => Err(BgRemovalError::unsupported_format(format!(
                "'{}'; use png or jpg",
                other
            ))),
        }
    }

    /// Convert an RGBA image to the pixel layout of the target format
    ///
    /// JPEG has no alpha channel, so the alpha is dropped without compositing
    /// onto a background color.
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Png => DynamicImage::ImageRgba8(rgba_image),
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba_image).to_rgb8()),
        }
    }

    /// Encode an RGBA result into the bytes of the target format
    ///
    /// # Errors
    /// Returns `BgRemovalError::Internal` if the encoder fails
    pub fn encode(rgba_image: RgbaImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let image = Self::convert_format(rgba_image, format);
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            OutputFormat::Png => image.write_to(&mut cursor, ImageFormat::Png),
            OutputFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut cursor, jpeg_quality);
                encoder.encode_image(&image)
            },
        }
        .map_err(|e| BgRemovalError::internal(format!("Failed to encode {} output: {}", format, e)))?;

        Ok(buffer)
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png => true,
            OutputFormat::Jpeg => false,
        }
    }
}
