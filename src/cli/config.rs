//! Conversion of CLI arguments into library configuration

use crate::cli::main_impl::Cli;
use crate::{
    backends::BackendType,
    config::{InferenceConfig, RemovalConfig, ServerConfig},
    models::{ModelSource, ModelSpec},
    tracing_config::TracingFormat,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

const MIB: usize = 1024 * 1024;

/// Everything the server needs to start
#[derive(Debug, Clone)]
pub(crate) struct ServeSettings {
    pub(crate) model: ModelSpec,
    pub(crate) model_sha256: Option<String>,
    pub(crate) cache_dir: Option<PathBuf>,
    pub(crate) backend_type: BackendType,
    pub(crate) inference: InferenceConfig,
    pub(crate) removal: RemovalConfig,
    pub(crate) server: ServerConfig,
}

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the server settings from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServeSettings> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider format")?;

        let max_bytes = cli.max_body_mb.saturating_mul(MIB);

        let removal = RemovalConfig::builder()
            .jpeg_quality(cli.jpeg_quality)
            .fetch_timeout(Duration::from_secs(cli.fetch_timeout_secs))
            .inference_timeout(Duration::from_secs(cli.inference_timeout_secs))
            .max_concurrent_inferences(cli.max_concurrent_inferences)
            .max_fetch_bytes(max_bytes as u64)
            .build()
            .context("Invalid configuration")?;

        // Same thread count for intra- and inter-op parallelism
        let inference = InferenceConfig {
            execution_provider,
            intra_threads: cli.threads,
            inter_threads: cli.threads,
            apply_sigmoid: !cli.no_sigmoid,
        };

        let server = ServerConfig {
            host: cli.host.clone(),
            port: cli.port,
            max_body_bytes: max_bytes,
        };

        Ok(ServeSettings {
            model: ModelSpec {
                source: ModelSource::parse(cli.model.trim()),
                variant: cli.variant.clone(),
            },
            model_sha256: cli.model_sha256.clone(),
            cache_dir: cli.cache_dir.clone(),
            backend_type,
            inference,
            removal,
            server,
        })
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
            .context("Invalid execution provider format")?;

        if cli.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be between 0 and 100, got {}", cli.jpeg_quality);
        }
        if cli.max_concurrent_inferences == 0 {
            anyhow::bail!("--max-concurrent-inferences must be at least 1");
        }
        if cli.inference_timeout_secs == 0 || cli.fetch_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be at least one second");
        }
        if cli.max_body_mb == 0 {
            anyhow::bail!("--max-body-mb must be at least 1");
        }

        cli.log_format
            .parse::<TracingFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let model = cli.model.trim();
        if model.is_empty() {
            anyhow::bail!("Empty --model. Use a path or URL, or omit it for the default model.");
        }
        if let ModelSource::External(path) = ModelSource::parse(model) {
            if !path.exists() {
                anyhow::bail!("Model path does not exist: {}", path.display());
            }
        }

        if let Some(variant) = cli.variant.as_deref() {
            if !matches!(variant, "fp16" | "fp32") {
                anyhow::bail!("Unknown model variant '{variant}'. Supported: fp16, fp32");
            }
        }

        Ok(())
    }
}
