#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal API
//!
//! An HTTP service that removes image backgrounds with a `BiRefNet`-class
//! segmentation model, running on ONNX Runtime or Tract.
//!
//! A request flows through a fixed pipeline:
//!
//! 1. The payload is classified by content type (multipart form or JSON)
//! 2. Exactly one image source is selected: `image_file`, then `image_file_b64`, then `image_url`
//! 3. The image is decoded (or fetched) and converted to RGB
//! 4. The model produces a foreground mask at the original resolution
//! 5. The mask becomes the alpha channel of the original pixels
//! 6. The optional `size` token scales the result (`preview`, `medium`, `hd`, `full`, `auto`)
//! 7. The result is encoded as `png` (default) or `jpg`
//!
//! ## Features
//!
//! - **Multiple Backends**: ONNX Runtime (CUDA, `CoreML`, CPU) and Tract (pure Rust)
//! - **Model Sources**: local `.onnx` files, `HuggingFace`-style model directories, or URLs
//!   downloaded once into a local cache
//! - **Bounded Inference**: a configurable number of concurrent segmentation calls with
//!   a per-request deadline
//! - **Structured Logging**: `tracing` spans per request with a request id
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use bgremove_api::{
//!     create_router, AppState, DefaultBackendFactory, BackendFactory, BackendType,
//!     HttpImageFetcher, InferenceConfig, InputResolver, ModelManager, ModelSegmenter,
//!     RemovalConfig, RemovalPipeline,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manager = ModelManager::from_path("models/birefnet", Some("fp16"))?;
//! let backend = DefaultBackendFactory.create_backend(BackendType::Onnx, manager)?;
//! let segmenter = ModelSegmenter::new(backend, &InferenceConfig::default())?;
//!
//! let config = RemovalConfig::default();
//! let resolver = InputResolver::new(Arc::new(HttpImageFetcher::new(&config)?));
//! let pipeline = RemovalPipeline::new(Arc::new(segmenter), resolver, config);
//!
//! let app = create_router(AppState::new(pipeline), 50 * 1024 * 1024);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): The `bgremove-api` server binary
//! - `webp-support` (default): WebP input decoding
//! - `tracing-json`, `tracing-files`: JSON log lines and file output for the binary

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod input;
pub mod models;
pub mod processor;
pub mod segmentation;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use config::{ExecutionProvider, InferenceConfig, OutputFormat, RemovalConfig, ServerConfig};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use input::{
    ContentKind, FormPayload, HttpImageFetcher, ImageFetcher, InputResolver, JsonPayload,
    RequestPayload,
};
pub use models::{ModelManager, ModelSource, ModelSpec, PreprocessingConfig};
pub use processor::RemovalPipeline;
pub use segmentation::{ModelSegmenter, Segmenter};
pub use server::{create_router, serve, ApiError, AppState};
pub use services::{OutputFormatHandler, SizePolicy, SizeToken};
pub use tracing_config::{spans, TracingConfig, TracingFormat, TracingOutput};
pub use types::{EncodedImage, ProcessingTimings, ResolvedImage, SegmentationMask};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, ProviderInfo};
