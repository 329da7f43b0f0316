//! Server bootstrap: argument parsing, model loading and the HTTP listener

use crate::{
    backends::{BackendFactory, DefaultBackendFactory},
    cli::config::{CliConfigBuilder, ServeSettings},
    download::{ModelDownloader, DEFAULT_MODEL_URL},
    input::{HttpImageFetcher, InputResolver},
    models::{ModelManager, ModelSource},
    processor::RemovalPipeline,
    segmentation::ModelSegmenter,
    server::{self, AppState},
    tracing_config::{spans, TracingConfig, TracingFormat, TracingGuard, TracingOutput},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::Instrument;

/// Background removal HTTP service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-api")]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Model to serve: a `.onnx` file, a model directory, or an http(s) URL.
    /// Defaults to the BiRefNet ONNX repository on HuggingFace
    #[arg(short, long, env = "BGREMOVE_MODEL", default_value = DEFAULT_MODEL_URL)]
    pub model: String,

    /// Model variant to load from a model directory (fp16 or fp32)
    #[arg(long, env = "BGREMOVE_MODEL_VARIANT")]
    pub variant: Option<String>,

    /// Expected SHA-256 of a model downloaded from a URL
    #[arg(long, env = "BGREMOVE_MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// Execution provider (onnx:auto, onnx:cpu, onnx:cuda, onnx:coreml, tract:cpu)
    #[arg(short, long, env = "BGREMOVE_EXECUTION_PROVIDER", default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Inference threads (0 = auto-detect)
    #[arg(short, long, env = "BGREMOVE_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Segmentation calls allowed to run at the same time
    #[arg(long, env = "BGREMOVE_MAX_CONCURRENT_INFERENCES", default_value_t = 1)]
    pub max_concurrent_inferences: usize,

    /// Seconds a request may wait for and run segmentation
    #[arg(long, env = "BGREMOVE_INFERENCE_TIMEOUT_SECS", default_value_t = 120)]
    pub inference_timeout_secs: u64,

    /// Seconds allowed for fetching an `image_url`
    #[arg(long, env = "BGREMOVE_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Largest accepted request body and fetched image, in MiB
    #[arg(long, env = "BGREMOVE_MAX_BODY_MB", default_value_t = 50)]
    pub max_body_mb: usize,

    /// JPEG quality for `jpg` output (0-100)
    #[arg(long, env = "BGREMOVE_JPEG_QUALITY", default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Treat the model output as probabilities instead of logits
    #[arg(long, env = "BGREMOVE_NO_SIGMOID")]
    pub no_sigmoid: bool,

    /// Directory for downloaded models (default: platform cache dir)
    #[arg(long, env = "BGREMOVE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, env = "BGREMOVE_LOG_FORMAT", default_value = "console")]
    pub log_format: String,

    /// Filter directives overriding -v (e.g. `bgremove_api=debug,tower=info`)
    #[arg(long, env = "RUST_LOG")]
    pub log_filter: Option<String>,

    /// Write logs to a daily-rolling file instead of stdout
    #[cfg(feature = "tracing-files")]
    #[arg(long, env = "BGREMOVE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,
}

/// Main CLI entry point
///
/// # Errors
/// - Invalid arguments or logging setup
/// - Model resolution, download or backend initialization failures
/// - The listener cannot be bound
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracing_guard = init_tracing(&cli).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid arguments")?;
    let settings = CliConfigBuilder::from_cli(&cli)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %settings.model.source.display_name(),
        provider = %ExecutionProviderManager::provider_to_string(
            settings.backend_type,
            settings.inference.execution_provider
        ),
        max_concurrent_inferences = settings.removal.max_concurrent_inferences,
        "Starting background removal service"
    );

    let segmenter = load_segmenter(&settings).await?;

    let fetcher = HttpImageFetcher::new(&settings.removal).context("Failed to create HTTP client")?;
    let resolver = InputResolver::new(Arc::new(fetcher));
    let pipeline = RemovalPipeline::new(Arc::new(segmenter), resolver, settings.removal.clone());

    server::serve(&settings.server, AppState::new(pipeline))
        .await
        .context("Server error")?;

    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<TracingGuard> {
    let format: TracingFormat = cli
        .log_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .with_output(TracingOutput::Console);

    #[cfg(feature = "tracing-files")]
    if let Some(path) = &cli.log_file {
        config = config.with_output(TracingOutput::File(path.clone()));
    }

    if let Some(filter) = &cli.log_filter {
        config = config.with_env_filter(filter.clone());
    }

    config.init()
}

/// Resolve the model, build the backend and initialize it
async fn load_segmenter(settings: &ServeSettings) -> Result<ModelSegmenter> {
    let provider = ExecutionProviderManager::provider_to_string(
        settings.backend_type,
        settings.inference.execution_provider,
    );
    let span = spans::model_loading(&settings.model.source.display_name(), &provider);

    async {
        let model_path = match &settings.model.source {
            ModelSource::External(path) => path.clone(),
            ModelSource::Url(url) => {
                let downloader = ModelDownloader::new(settings.cache_dir.clone())
                    .context("Failed to prepare model cache")?;
                downloader
                    .fetch_model(url, settings.model_sha256.as_deref())
                    .await
                    .with_context(|| format!("Failed to download model from {url}"))?
            },
        };

        let model_manager = ModelManager::from_path(&model_path, settings.model.variant.as_deref())
            .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
        if let Ok(info) = model_manager.get_info() {
            tracing::info!(
                name = %info.name,
                precision = %info.precision,
                size_mb = info.size_bytes / (1024 * 1024),
                "Model resolved"
            );
        }

        let backend = DefaultBackendFactory
            .create_backend(settings.backend_type, model_manager)
            .context("Failed to create inference backend")?;

        let inference_config = settings.inference.clone();
        tokio::task::spawn_blocking(move || ModelSegmenter::new(backend, &inference_config))
            .await
            .context("Model initialization task failed")?
            .context("Failed to initialize model")
    }
    .instrument(span)
    .await
}

/// Display execution provider diagnostics
fn show_provider_diagnostics() {
    println!("Backend and Execution Provider Diagnostics");
    println!("==========================================");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nCompiled backends:");
    for backend in DefaultBackendFactory.available_backends() {
        println!("  - {backend}");
    }

    println!("\nExecution providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "available"
        } else {
            "not available"
        };
        println!(
            "  - {}: {} ({})",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\nExamples:");
    println!("  --execution-provider onnx:auto    # best ONNX provider (default)");
    println!("  --execution-provider onnx:cuda    # NVIDIA CUDA");
    println!("  --execution-provider onnx:coreml  # Apple CoreML");
    println!("  --execution-provider tract:cpu    # pure Rust backend");
}
