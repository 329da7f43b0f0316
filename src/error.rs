//! Error types for background removal requests and service bootstrap

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Every failure the service can report
///
/// The first group of variants is what a `/remove-bg` request can fail with;
/// the second group only occurs while configuring or loading the model.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Request body is neither a multipart form nor JSON
    #[error("Unsupported content type '{0}'. Use multipart/form-data or application/json.")]
    UnsupportedContentType(String),

    /// No recognized image field is present in the request
    #[error("No image source provided. Send one of: image_file, image_file_b64, image_url.")]
    NoSourceProvided,

    /// Bytes were present but could not be decoded as an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Remote image could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Requested output format is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Segmentation model failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// An operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Body claims a supported content type but cannot be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network errors while downloading models
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new unsupported content type error
    pub fn unsupported_content_type<S: Into<String>>(content_type: S) -> Self {
        Self::UnsupportedContentType(content_type.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new fetch error
    pub fn fetch<S: Into<String>>(msg: S) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        Self::Timeout(operation.into())
    }

    /// Create a new malformed request error
    pub fn malformed_request<S: Into<String>>(msg: S) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create network error with the underlying cause attached
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create decode error naming the input channel that failed
    pub fn decode_channel<E: std::fmt::Display>(channel: &str, error: E) -> Self {
        Self::Decode(format!("Error reading {}: {}", channel, error))
    }

    /// Whether the failure was caused by the client's request rather than the service
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedContentType(_)
                | Self::NoSourceProvided
                | Self::Decode(_)
                | Self::UnsupportedFormat(_)
                | Self::MalformedRequest(_)
        )
    }
}
