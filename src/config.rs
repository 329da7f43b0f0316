//! Configuration types for the removal pipeline, inference backends and server

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Encodings a removal result can be returned in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG, alpha channel dropped
    Jpeg,
}

impl OutputFormat {
    /// MIME type sent as the response `Content-Type`
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Format token clients use to request this encoding
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Backend configuration applied when a model session is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Apply a sigmoid to the raw model output (BiRefNet emits logits)
    pub apply_sigmoid: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            apply_sigmoid: true,
        }
    }
}

/// Per-request behavior of the removal pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// JPEG quality (0-100, only used for `jpg` output)
    pub jpeg_quality: u8,

    /// Deadline for fetching an `image_url` source
    pub fetch_timeout: Duration,

    /// Deadline for one segmentation call, measured from the moment it is queued
    pub inference_timeout: Duration,

    /// Maximum number of segmentation calls running at the same time
    pub max_concurrent_inferences: usize,

    /// Largest response body accepted from an `image_url` fetch
    pub max_fetch_bytes: u64,

    /// `User-Agent` sent on outbound image fetches
    pub user_agent: String,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            fetch_timeout: Duration::from_secs(30),
            inference_timeout: Duration::from_secs(120),
            max_concurrent_inferences: 1,
            max_fetch_bytes: 50 * 1024 * 1024,
            user_agent: default_user_agent(),
        }
    }
}

/// Identifying client header for outbound requests
#[must_use]
pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bgremove_api::RemovalConfig;
    /// use std::time::Duration;
    ///
    /// let config = RemovalConfig::builder()
    ///     .jpeg_quality(85)
    ///     .max_concurrent_inferences(2)
    ///     .inference_timeout(Duration::from_secs(60))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.jpeg_quality, 85);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - Zero concurrency limit
    /// - Zero timeouts or fetch size limit
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(BgRemovalError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }
        if self.max_concurrent_inferences == 0 {
            return Err(BgRemovalError::config_value_error(
                "max_concurrent_inferences",
                0,
                "1 or more",
                Some(1),
            ));
        }
        if self.fetch_timeout.is_zero() || self.inference_timeout.is_zero() {
            return Err(BgRemovalError::invalid_config("Timeouts must be non-zero"));
        }
        if self.max_fetch_bytes == 0 {
            return Err(BgRemovalError::invalid_config(
                "max_fetch_bytes must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RemovalConfig::default(),
        }
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(0, 100);
        self
    }

    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn inference_timeout(mut self, timeout: Duration) -> Self {
        self.config.inference_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_concurrent_inferences(mut self, limit: usize) -> Self {
        self.config.max_concurrent_inferences = limit;
        self
    }

    #[must_use]
    pub fn max_fetch_bytes(mut self, bytes: u64) -> Self {
        self.config.max_fetch_bytes = bytes;
        self
    }

    #[must_use]
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Listener settings for the HTTP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Largest request body accepted on `/remove-bg`
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_config_defaults() {
        let config = RemovalConfig::default();
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.max_concurrent_inferences, 1);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("bgremove-api/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = RemovalConfig::builder().jpeg_quality(150).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = RemovalConfig::default();
        config.jpeg_quality = 101;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("JPEG quality"));
        assert!(error.to_string().contains("101"));

        let result = RemovalConfig::builder().max_concurrent_inferences(0).build();
        assert!(matches!(result, Err(BgRemovalError::InvalidConfig(_))));

        let result = RemovalConfig::builder()
            .inference_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_metadata() {
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Jpeg.to_string(), "jpg");
        assert_eq!(OutputFormat::default(), OutputFormat::Png);
    }

    #[test]
    fn test_server_bind_address() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_execution_provider_display() {
        assert_eq!(ExecutionProvider::Auto.to_string(), "auto");
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
    }
}
