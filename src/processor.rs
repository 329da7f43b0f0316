//! Background removal pipeline
//!
//! [`RemovalPipeline::process`] runs one request end to end: resolve the input
//! image, read the size and format options, segment, composite the mask as
//! alpha, optionally downscale, and encode. Each stage runs in that order and
//! the first failure ends the request.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    input::{InputResolver, RequestPayload},
    segmentation::Segmenter,
    services::{OutputFormatHandler, SizePolicy},
    types::{EncodedImage, ProcessingTimings, SegmentationMask, FIELD_FORMAT, FIELD_SIZE},
};
use image::{imageops::FilterType, RgbImage, RgbaImage};
use instant::Instant;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Request pipeline shared by all connections
pub struct RemovalPipeline {
    segmenter: Arc<dyn Segmenter>,
    resolver: InputResolver,
    config: RemovalConfig,
    inference_slots: Arc<Semaphore>,
}

impl std::fmt::Debug for RemovalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalPipeline")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .field("model_loaded", &self.segmenter.is_loaded())
            .finish_non_exhaustive()
    }
}

/// Output of the post-inference stages
struct Rendered {
    encoded: EncodedImage,
    foreground_ratio: f32,
    postprocessing_ms: u64,
    encode_ms: u64,
}

impl RemovalPipeline {
    #[must_use]
    pub fn new(segmenter: Arc<dyn Segmenter>, resolver: InputResolver, config: RemovalConfig) -> Self {
        let inference_slots = Arc::new(Semaphore::new(config.max_concurrent_inferences.max(1)));
        Self {
            segmenter,
            resolver,
            config,
            inference_slots,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Whether the segmentation model is ready
    #[must_use]
    pub fn is_model_loaded(&self) -> bool {
        self.segmenter.is_loaded()
    }

    /// Remove the background from the image in `payload`
    ///
    /// # Errors
    /// Any failure of input resolution, segmentation, or output encoding.
    /// No stage is retried and the original image is never returned as a fallback.
    pub async fn process(&self, payload: RequestPayload) -> Result<EncodedImage> {
        self.process_with_timings(payload)
            .await
            .map(|(encoded, _)| encoded)
    }

    /// [`Self::process`] plus a per-stage timing breakdown
    ///
    /// # Errors
    /// See [`Self::process`]
    pub async fn process_with_timings(
        &self,
        payload: RequestPayload,
    ) -> Result<(EncodedImage, ProcessingTimings)> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();

        let stage_start = Instant::now();
        let resolved = self
            .resolver
            .resolve(&payload)
            .instrument(tracing::debug_span!("resolve"))
            .await?;
        timings.resolve_ms = stage_start.elapsed().as_millis() as u64;
        let original_size = resolved.dimensions();

        let size_token = payload.field(FIELD_SIZE);
        let format_token = payload.field(FIELD_FORMAT);
        drop(payload);

        let target_size = SizePolicy::compute_target_size(original_size, size_token.as_deref());
        let format_token = OutputFormatHandler::resolve_format(format_token.as_deref());
        tracing::debug!(
            channel = resolved.channel,
            width = original_size.0,
            height = original_size.1,
            size = size_token.as_deref().unwrap_or(""),
            format = %format_token,
            "Resolved input"
        );

        let image = Arc::new(resolved.image);

        let stage_start = Instant::now();
        let mask = self
            .segment(Arc::clone(&image))
            .instrument(tracing::debug_span!("segmentation"))
            .await?;
        timings.inference_ms = stage_start.elapsed().as_millis() as u64;

        let jpeg_quality = self.config.jpeg_quality;
        let rendered = tokio::task::spawn_blocking(move || {
            Self::render(&image, &mask, target_size, &format_token, jpeg_quality)
        })
        .await
        .map_err(|e| BgRemovalError::internal(format!("Postprocessing task failed: {e}")))??;

        timings.postprocessing_ms = rendered.postprocessing_ms;
        timings.encode_ms = rendered.encode_ms;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        tracing::info!(
            resolve_ms = timings.resolve_ms,
            inference_ms = timings.inference_ms,
            postprocessing_ms = timings.postprocessing_ms,
            encode_ms = timings.encode_ms,
            total_ms = timings.total_ms,
            inference_share = timings.inference_ratio(),
            foreground_ratio = rendered.foreground_ratio,
            format = %rendered.encoded.format,
            width = rendered.encoded.dimensions.0,
            height = rendered.encoded.dimensions.1,
            bytes = rendered.encoded.bytes.len(),
            "Background removed"
        );

        Ok((rendered.encoded, timings))
    }

    /// Run segmentation on the blocking pool behind the inference semaphore
    ///
    /// The deadline covers waiting for a slot. The permit moves into the
    /// blocking task, so a timed-out call keeps its slot until the model returns.
    async fn segment(&self, image: Arc<RgbImage>) -> Result<SegmentationMask> {
        let segmenter = Arc::clone(&self.segmenter);
        let slots = Arc::clone(&self.inference_slots);

        let work = async move {
            let permit = slots
                .acquire_owned()
                .await
                .map_err(|_| BgRemovalError::internal("Inference semaphore closed"))?;

            let span = tracing::Span::current();
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let _entered = span.enter();
                segmenter.segment(&image)
            })
            .await
            .map_err(|e| BgRemovalError::inference(format!("Segmentation task failed: {e}")))?
        };

        match tokio::time::timeout(self.config.inference_timeout, work).await {
            Ok(Ok(mask)) => Ok(mask),
            Ok(Err(e @ (BgRemovalError::Inference(_) | BgRemovalError::Timeout(_)))) => Err(e),
            Ok(Err(e)) => Err(BgRemovalError::inference(e.to_string())),
            Err(_) => Err(BgRemovalError::timeout(format!(
                "inference exceeded {}s",
                self.config.inference_timeout.as_secs_f64()
            ))),
        }
    }

    /// Composite, optionally resize, then encode
    fn render(
        image: &RgbImage,
        mask: &SegmentationMask,
        target_size: Option<(u32, u32)>,
        format_token: &str,
        jpeg_quality: u8,
    ) -> Result<Rendered> {
        let stage_start = Instant::now();
        let foreground_ratio = mask.foreground_ratio();
        let rgba = {
            let _span = tracing::debug_span!("composite").entered();
            let composited = Self::composite(image, mask)?;
            match target_size {
                Some((width, height)) => {
                    image::imageops::resize(&composited, width, height, FilterType::Lanczos3)
                },
                None => composited,
            }
        };
        let postprocessing_ms = stage_start.elapsed().as_millis() as u64;

        let stage_start = Instant::now();
        let _span = tracing::debug_span!("encode", format = format_token).entered();
        let format = OutputFormatHandler::parse_format(format_token)?;
        if !OutputFormatHandler::supports_transparency(format) {
            tracing::debug!(format = %format, "Output format has no alpha channel, dropping it");
        }
        let dimensions = rgba.dimensions();
        let bytes = OutputFormatHandler::encode(rgba, format, jpeg_quality)?;

        Ok(Rendered {
            encoded: EncodedImage {
                bytes,
                format,
                dimensions,
            },
            foreground_ratio,
            postprocessing_ms,
            encode_ms: stage_start.elapsed().as_millis() as u64,
        })
    }

    /// Attach `mask` to `image` as its alpha channel
    ///
    /// Color values are copied unchanged, including under fully transparent pixels.
    ///
    /// # Errors
    /// Returns `BgRemovalError::Internal` when the mask does not match the image
    pub fn composite(image: &RgbImage, mask: &SegmentationMask) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        if mask.dimensions != (width, height) || mask.data.len() != (width as usize) * (height as usize) {
            return Err(BgRemovalError::internal(format!(
                "Mask {:?} does not match image {}x{}",
                mask.dimensions, width, height
            )));
        }

        let data: Vec<u8> = image
            .pixels()
            .zip(&mask.data)
            .flat_map(|(pixel, &alpha)| [pixel[0], pixel[1], pixel[2], alpha])
            .collect();

        RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| BgRemovalError::internal("Composited buffer has unexpected length"))
    }
}
