//! Request payloads and image source resolution
//!
//! A request is classified by its content type before any field is read.
//! Sources are then tried in fixed priority order (file upload, base64
//! payload, remote URL) and only the first present one is decoded.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    types::{ImageSource, ResolvedImage, FIELD_IMAGE_FILE_B64, FIELD_IMAGE_URL},
};
use async_trait::async_trait;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use futures_util::stream::TryStreamExt;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

/// Standard alphabet, padding optional
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body protocol of a `/remove-bg` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `multipart/form-data`
    Form,
    /// `application/json` or `application/*+json`
    Json,
}

impl ContentKind {
    /// Classify a `Content-Type` header value
    ///
    /// Parameters such as `boundary` or `charset` are ignored and matching is
    /// case-insensitive.
    ///
    /// # Errors
    /// Returns `BgRemovalError::UnsupportedContentType` for anything that is
    /// neither a multipart form nor JSON, including a missing header.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_api::input::ContentKind;
    ///
    /// assert_eq!(ContentKind::classify(Some("application/json")).unwrap(), ContentKind::Json);
    /// assert_eq!(
    ///     ContentKind::classify(Some("multipart/form-data; boundary=x")).unwrap(),
    ///     ContentKind::Form
    /// );
    /// assert!(ContentKind::classify(Some("text/plain")).is_err());
    /// ```
    pub fn classify(content_type: Option<&str>) -> Result<Self> {
        let raw = content_type.unwrap_or_default();
        let essence = raw.split(';').next().unwrap_or_default().trim().to_lowercase();

        if essence == "multipart/form-data" {
            return Ok(Self::Form);
        }
        if essence == "application/json"
            || (essence.starts_with("application/") && essence.ends_with("+json"))
        {
            return Ok(Self::Json);
        }

        let shown = if raw.trim().is_empty() { "<none>" } else { raw.trim() };
        Err(BgRemovalError::unsupported_content_type(shown))
    }
}

/// Fields of a multipart form request
#[derive(Debug, Clone, Default)]
pub struct FormPayload {
    /// Contents of the `image_file` part, if one was sent
    pub file: Option<Vec<u8>>,
    /// Text fields by name
    pub fields: HashMap<String, String>,
}

impl FormPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the uploaded file part
    #[must_use]
    pub fn with_file(mut self, bytes: Vec<u8>) -> Self {
        self.file = Some(bytes);
        self
    }

    /// Add a text field; the first value sent for a name wins
    #[must_use]
    pub fn with_field<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.fields.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Top-level object of a JSON request
#[derive(Debug, Clone, Default)]
pub struct JsonPayload {
    pub fields: Map<String, Value>,
}

impl JsonPayload {
    /// Parse a JSON request body
    ///
    /// # Errors
    /// Returns `BgRemovalError::MalformedRequest` for invalid JSON or a
    /// top-level value that is not an object.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| BgRemovalError::malformed_request(format!("Invalid JSON body: {}", e)))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(BgRemovalError::malformed_request(format!(
                "JSON body must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Read a field as text; scalars are stringified, empty strings count as absent
    fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(value) if value.is_empty() => None,
            Value::String(value) => Some(value.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Look up a source field that must hold a non-empty string
    ///
    /// `Ok(None)` means the field is absent (missing, `null` or empty).
    fn source_str(&self, name: &str) -> Result<Option<&str>> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) if value.is_empty() => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(other) => {
                let message = format!("expected a string, got {}", json_kind(other));
                if name == FIELD_IMAGE_URL {
                    Err(BgRemovalError::fetch(format!("Error reading {}: {}", name, message)))
                } else {
                    Err(BgRemovalError::decode_channel(name, message))
                }
            },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parsed body of a `/remove-bg` request
#[derive(Debug, Clone)]
pub enum RequestPayload {
    Form(FormPayload),
    Json(JsonPayload),
}

impl RequestPayload {
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Form(_) => ContentKind::Form,
            Self::Json(_) => ContentKind::Json,
        }
    }

    /// Read an optional text field such as `size` or `format`
    #[must_use]
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            Self::Form(form) => form.text(name).map(str::to_string),
            Self::Json(json) => json.text(name),
        }
    }

    /// Pick the highest-priority image source present in the payload
    ///
    /// Lower-priority fields are not inspected once a source is found. JSON
    /// bodies have no `image_file` channel.
    ///
    /// # Errors
    /// - `BgRemovalError::NoSourceProvided` when no source field is present
    /// - `BgRemovalError::Decode`/`Fetch` for JSON source fields that are not strings
    pub fn select_source(&self) -> Result<ImageSource<'_>> {
        match self {
            Self::Form(form) => {
                if let Some(bytes) = form.file.as_deref().filter(|bytes| !bytes.is_empty()) {
                    return Ok(ImageSource::FileUpload(bytes));
                }
                if let Some(payload) = form.text(FIELD_IMAGE_FILE_B64) {
                    return Ok(ImageSource::Base64Payload(payload));
                }
                if let Some(url) = form.text(FIELD_IMAGE_URL) {
                    return Ok(ImageSource::RemoteUrl(url));
                }
            },
            Self::Json(json) => {
                if let Some(payload) = json.source_str(FIELD_IMAGE_FILE_B64)? {
                    return Ok(ImageSource::Base64Payload(payload));
                }
                if let Some(url) = json.source_str(FIELD_IMAGE_URL)? {
                    return Ok(ImageSource::RemoteUrl(url));
                }
            },
        }
        Err(BgRemovalError::NoSourceProvided)
    }
}

/// Decode a base64 image payload
///
/// Tolerates a `data:<mime>;base64,` prefix, embedded whitespace and missing
/// padding.
///
/// # Errors
/// Returns `BgRemovalError::Decode` when the text is not valid base64
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => trimmed,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    BASE64_LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| BgRemovalError::decode_channel(FIELD_IMAGE_FILE_B64, e))
}

/// Decode image bytes and normalize them to RGB
///
/// # Errors
/// Returns `BgRemovalError::Decode` naming `channel` when the bytes are not a supported image
pub fn decode_image(bytes: &[u8], channel: &str) -> Result<image::RgbImage> {
    let image = image::load_from_memory(bytes).map_err(|e| BgRemovalError::decode_channel(channel, e))?;
    Ok(image.to_rgb8())
}

/// Capability to download a remote image
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the raw bytes behind `url`
    ///
    /// # Errors
    /// - `BgRemovalError::Fetch` for bad URLs, non-2xx responses, network failures or oversized bodies
    /// - `BgRemovalError::Timeout` when the fetch deadline passes
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `reqwest`-backed fetcher used by the server
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpImageFetcher {
    /// Create a fetcher honoring the timeout, size cap and user agent of `config`
    ///
    /// # Errors
    /// Returns `BgRemovalError::Network` if the HTTP client cannot be built
    pub fn new(config: &RemovalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            max_bytes: config.max_fetch_bytes,
        })
    }

    fn map_request_error(error: &reqwest::Error) -> BgRemovalError {
        if error.is_timeout() {
            BgRemovalError::timeout(format!("fetching {}", FIELD_IMAGE_URL))
        } else {
            BgRemovalError::fetch(format!("Error fetching {}: {}", FIELD_IMAGE_URL, error))
        }
    }

    fn too_large(&self) -> BgRemovalError {
        BgRemovalError::fetch(format!(
            "Error fetching {}: response exceeds {} bytes",
            FIELD_IMAGE_URL, self.max_bytes
        ))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| {
            BgRemovalError::fetch(format!("Error fetching {}: invalid URL: {}", FIELD_IMAGE_URL, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BgRemovalError::fetch(format!(
                "Error fetching {}: unsupported scheme '{}'",
                FIELD_IMAGE_URL,
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Self::map_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BgRemovalError::fetch(format!(
                "Error fetching {}: HTTP {}",
                FIELD_IMAGE_URL, status
            )));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large());
        }

        let mut body = Vec::new();
        let mut stream = Box::pin(response.bytes_stream());
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| Self::map_request_error(&e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "Fetched remote image");
        Ok(body)
    }
}

/// Turns a request payload into exactly one decoded image
#[derive(Clone)]
pub struct InputResolver {
    fetcher: Arc<dyn ImageFetcher>,
}

impl std::fmt::Debug for InputResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputResolver").finish_non_exhaustive()
    }
}

impl InputResolver {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve the payload's image source to an RGB bitmap
    ///
    /// # Errors
    /// `NoSourceProvided`, `Decode`, `Fetch` or `Timeout` depending on the
    /// selected source.
    #[instrument(skip_all, fields(protocol = ?payload.kind()))]
    pub async fn resolve(&self, payload: &RequestPayload) -> Result<ResolvedImage> {
        let source = payload.select_source()?;
        let channel = source.channel();
        debug!(channel, "Selected image source");

        let bytes = match source {
            ImageSource::FileUpload(bytes) => bytes.to_vec(),
            ImageSource::Base64Payload(payload) => decode_base64_payload(payload)?,
            ImageSource::RemoteUrl(url) => self.fetcher.fetch(url).await?,
        };

        let image = tokio::task::spawn_blocking(move || decode_image(&bytes, channel))
            .await
            .map_err(|e| BgRemovalError::internal(format!("Image decode task failed: {}", e)))??;

        debug!(width = image.width(), height = image.height(), channel, "Decoded input image");
        Ok(ResolvedImage { image, channel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FIELD_IMAGE_FILE;
    use base64::{engine::general_purpose, Engine as _};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    struct CountingFetcher {
        calls: AtomicUsize,
        body: Vec<u8>,
    }

    #[async_trait]
    impl ImageFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn resolver_with(body: Vec<u8>) -> (InputResolver, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            body,
        });
        (InputResolver::new(fetcher.clone()), fetcher)
    }

    #[test]
    fn test_classify_content_types() {
        assert_eq!(
            ContentKind::classify(Some("multipart/form-data; boundary=abc")).unwrap(),
            ContentKind::Form
        );
        assert_eq!(
            ContentKind::classify(Some("Application/JSON; charset=utf-8")).unwrap(),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::classify(Some("application/vnd.api+json")).unwrap(),
            ContentKind::Json
        );

        for content_type in [Some("text/plain"), Some("application/xml"), Some(""), None] {
            assert!(matches!(
                ContentKind::classify(content_type),
                Err(BgRemovalError::UnsupportedContentType(_))
            ));
        }
    }

    #[test]
    fn test_json_payload_must_be_object() {
        assert!(JsonPayload::from_slice(br#"{"size": "hd"}"#).is_ok());
        assert!(matches!(
            JsonPayload::from_slice(b"[1, 2]"),
            Err(BgRemovalError::MalformedRequest(_))
        ));
        assert!(matches!(
            JsonPayload::from_slice(b"{not json"),
            Err(BgRemovalError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_json_fields_stringify_scalars() {
        let payload = RequestPayload::Json(
            JsonPayload::from_slice(
                br#"{"size": "HD", "format": 5, "flag": true, "none": null, "list": [1], "empty": ""}"#,
            )
            .unwrap(),
        );
        assert_eq!(payload.field("size").as_deref(), Some("HD"));
        assert_eq!(payload.field("format").as_deref(), Some("5"));
        assert_eq!(payload.field("flag").as_deref(), Some("true"));
        assert_eq!(payload.field("none"), None);
        assert_eq!(payload.field("list"), None);
        assert_eq!(payload.field("empty"), None);
        assert_eq!(payload.field("missing"), None);
    }

    #[test]
    fn test_form_source_priority() {
        let payload = RequestPayload::Form(
            FormPayload::new()
                .with_file(vec![1, 2, 3])
                .with_field(FIELD_IMAGE_FILE_B64, "aGVsbG8=")
                .with_field(FIELD_IMAGE_URL, "not a url"),
        );
        assert_eq!(
            payload.select_source().unwrap(),
            ImageSource::FileUpload(&[1, 2, 3])
        );

        let payload = RequestPayload::Form(
            FormPayload::new()
                .with_file(Vec::new())
                .with_field(FIELD_IMAGE_FILE_B64, "")
                .with_field(FIELD_IMAGE_URL, "https://example.com/a.png"),
        );
        assert_eq!(
            payload.select_source().unwrap(),
            ImageSource::RemoteUrl("https://example.com/a.png")
        );
    }

    #[test]
    fn test_json_ignores_image_file_field() {
        let payload = RequestPayload::Json(
            JsonPayload::from_slice(br#"{"image_file": "aGVsbG8="}"#).unwrap(),
        );
        assert!(matches!(
            payload.select_source(),
            Err(BgRemovalError::NoSourceProvided)
        ));
    }

    #[test]
    fn test_json_non_string_sources() {
        let payload =
            RequestPayload::Json(JsonPayload::from_slice(br#"{"image_file_b64": 42}"#).unwrap());
        assert!(matches!(payload.select_source(), Err(BgRemovalError::Decode(_))));

        let payload =
            RequestPayload::Json(JsonPayload::from_slice(br#"{"image_url": {"a": 1}}"#).unwrap());
        assert!(matches!(payload.select_source(), Err(BgRemovalError::Fetch(_))));

        let payload = RequestPayload::Json(
            JsonPayload::from_slice(br#"{"image_file_b64": null, "image_url": "https://x/y.png"}"#)
                .unwrap(),
        );
        assert_eq!(
            payload.select_source().unwrap(),
            ImageSource::RemoteUrl("https://x/y.png")
        );
    }

    #[test]
    fn test_empty_form_has_no_source() {
        let payload = RequestPayload::Form(FormPayload::new().with_field("size", "hd"));
        assert!(matches!(
            payload.select_source(),
            Err(BgRemovalError::NoSourceProvided)
        ));
    }

    #[test]
    fn test_decode_base64_variants() {
        let raw = png_bytes(2, 2);
        let standard = general_purpose::STANDARD.encode(&raw);

        assert_eq!(decode_base64_payload(&standard).unwrap(), raw);
        assert_eq!(
            decode_base64_payload(&format!("data:image/png;base64,{}", standard)).unwrap(),
            raw
        );
        assert_eq!(
            decode_base64_payload(standard.trim_end_matches('=')).unwrap(),
            raw
        );

        let wrapped: String = standard
            .as_bytes()
            .chunks(16)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(decode_base64_payload(&format!("  {}\n", wrapped)).unwrap(), raw);

        let error = decode_base64_payload("!!not base64!!").unwrap_err();
        assert!(error.to_string().contains("Error reading image_file_b64"));
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        let error = decode_image(b"definitely not an image", "image_file").unwrap_err();
        assert!(matches!(error, BgRemovalError::Decode(_)));
        assert!(error.to_string().contains("Error reading image_file"));
    }

    #[tokio::test]
    async fn test_resolver_prefers_upload_and_skips_fetch() {
        let (resolver, fetcher) = resolver_with(png_bytes(5, 5));
        let payload = RequestPayload::Form(
            FormPayload::new()
                .with_file(png_bytes(8, 4))
                .with_field(FIELD_IMAGE_URL, "https://example.com/other.png"),
        );

        let resolved = resolver.resolve(&payload).await.unwrap();
        assert_eq!(resolved.dimensions(), (8, 4));
        assert_eq!(resolved.channel, FIELD_IMAGE_FILE);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolver_reports_bad_higher_priority_source() {
        let (resolver, fetcher) = resolver_with(png_bytes(5, 5));
        let payload = RequestPayload::Json(
            JsonPayload::from_slice(
                br#"{"image_file_b64": "%%%%", "image_url": "https://example.com/a.png"}"#,
            )
            .unwrap(),
        );

        let error = resolver.resolve(&payload).await.unwrap_err();
        assert!(matches!(error, BgRemovalError::Decode(_)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolver_fetches_url() {
        let (resolver, fetcher) = resolver_with(png_bytes(6, 3));
        let payload = RequestPayload::Json(
            JsonPayload::from_slice(br#"{"image_url": "https://example.com/a.png"}"#).unwrap(),
        );

        let resolved = resolver.resolve(&payload).await.unwrap();
        assert_eq!(resolved.dimensions(), (6, 3));
        assert_eq!(resolved.channel, FIELD_IMAGE_URL);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_non_http_schemes() {
        let fetcher = HttpImageFetcher::new(&RemovalConfig::default()).unwrap();
        for url in ["ftp://example.com/a.png", "file:///etc/passwd", "not a url"] {
            let error = fetcher.fetch(url).await.unwrap_err();
            assert!(matches!(error, BgRemovalError::Fetch(_)), "url {url}");
        }
    }

    /// Serve a few fixed routes on an ephemeral local port
    async fn spawn_image_host() -> String {
        use axum::{
            http::{header::USER_AGENT, HeaderMap, StatusCode},
            routing::get,
            Router,
        };

        let app = Router::new()
            .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
            .route("/large.png", get(|| async { vec![0u8; 4096] }))
            .route(
                "/agent",
                get(|headers: HeaderMap| async move {
                    headers
                        .get(USER_AGENT)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
            .route(
                "/slow.png",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_error_status() {
        let base = spawn_image_host().await;
        let fetcher = HttpImageFetcher::new(&RemovalConfig::default()).unwrap();

        let error = fetcher.fetch(&format!("{base}/missing.png")).await.unwrap_err();
        assert!(matches!(error, BgRemovalError::Fetch(_)));
        assert!(error.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_http_fetcher_enforces_size_cap() {
        let base = spawn_image_host().await;
        let config = RemovalConfig::builder().max_fetch_bytes(1024).build().unwrap();
        let fetcher = HttpImageFetcher::new(&config).unwrap();

        let error = fetcher.fetch(&format!("{base}/large.png")).await.unwrap_err();
        assert!(matches!(error, BgRemovalError::Fetch(_)));
        assert!(error.to_string().contains("exceeds 1024 bytes"));

        let config = RemovalConfig::builder().max_fetch_bytes(4096).build().unwrap();
        let body = HttpImageFetcher::new(&config)
            .unwrap()
            .fetch(&format!("{base}/large.png"))
            .await
            .unwrap();
        assert_eq!(body.len(), 4096);
    }

    #[tokio::test]
    async fn test_http_fetcher_sends_service_user_agent() {
        let base = spawn_image_host().await;
        let fetcher = HttpImageFetcher::new(&RemovalConfig::default()).unwrap();

        let body = fetcher.fetch(&format!("{base}/agent")).await.unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), crate::config::default_user_agent());
    }

    #[tokio::test]
    async fn test_http_fetcher_times_out() {
        let base = spawn_image_host().await;
        let config = RemovalConfig::builder()
            .fetch_timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let fetcher = HttpImageFetcher::new(&config).unwrap();

        let error = fetcher.fetch(&format!("{base}/slow.png")).await.unwrap_err();
        assert!(matches!(error, BgRemovalError::Timeout(_)), "{error}");
    }
}
