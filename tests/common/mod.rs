//! Stub segmenters, fetchers and image helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use bgremove_api::{
    error::{BgRemovalError, Result},
    types::SegmentationMask,
    ImageFetcher, InputResolver, RemovalConfig, RemovalPipeline, Segmenter,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Segmenter that marks every pixel as foreground
#[derive(Default)]
pub struct OpaqueSegmenter {
    pub calls: AtomicUsize,
}

impl Segmenter for OpaqueSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SegmentationMask::filled(image.dimensions(), 255))
    }

    fn is_loaded(&self) -> bool {
        true
    }
}

/// Segmenter that keeps only the left half of the image
pub struct LeftHalfSegmenter;

impl Segmenter for LeftHalfSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        let data = (0..height)
            .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 255 } else { 0 }))
            .collect();
        Ok(SegmentationMask::new(data, (width, height)))
    }

    fn is_loaded(&self) -> bool {
        true
    }
}

/// Segmenter whose model never loaded
pub struct BrokenSegmenter;

impl Segmenter for BrokenSegmenter {
    fn segment(&self, _image: &RgbImage) -> Result<SegmentationMask> {
        Err(BgRemovalError::inference("session not available"))
    }

    fn is_loaded(&self) -> bool {
        false
    }
}

/// Fetcher serving a fixed set of URLs and recording every request
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), bytes);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| BgRemovalError::fetch(format!("{url} returned HTTP 404")))
    }
}

pub fn pipeline_with(
    segmenter: Arc<dyn Segmenter>,
    fetcher: Arc<StubFetcher>,
) -> RemovalPipeline {
    RemovalPipeline::new(segmenter, InputResolver::new(fetcher), RemovalConfig::default())
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(&RgbImage::from_pixel(width, height, Rgb(color)), ImageFormat::Png)
}

pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
