//! Model downloading into a local cache
//!
//! Two kinds of URL are understood:
//! - a `HuggingFace` repository (`https://huggingface.co/<user>/<repo>`), fetched
//!   as a model directory with `preprocessor_config.json` and the ONNX variants
//! - any other `http(s)` URL, fetched as a single `.onnx` file
//!
//! Files are streamed into a `.part` sibling and renamed only once complete, so
//! an interrupted download never leaves a truncated model in the cache.

use crate::error::{BgRemovalError, Result};
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// BiRefNet ONNX export served when no model is configured
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/onnx-community/BiRefNet-ONNX";

/// Optional repository files, downloaded when present
const CONFIG_FILES: &[&str] = &["preprocessor_config.json"];

/// ONNX model files to attempt downloading from a repository
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Downloads models into `<cache root>/models`
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache_dir: PathBuf,
}

impl ModelDownloader {
    /// Create a downloader
    ///
    /// `cache_root` overrides the platform cache directory; models are stored
    /// in its `models` subdirectory either way.
    ///
    /// # Errors
    /// - No platform cache directory and no override
    /// - Failed to create the cache directory or HTTP client
    pub fn new(cache_root: Option<PathBuf>) -> Result<Self> {
        let root = match cache_root {
            Some(root) => root,
            None => dirs::cache_dir()
                .map(|dir| dir.join(env!("CARGO_PKG_NAME")))
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(
                        "No platform cache directory available; pass --cache-dir",
                    )
                })?,
        };
        let cache_dir = root.join("models");
        fs::create_dir_all(&cache_dir)
            .map_err(|e| BgRemovalError::file_io_error("create cache directory", &cache_dir, &e))?;

        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(crate::config::default_user_agent())
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache_dir })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Filesystem-safe cache key for a model URL
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_api::download::ModelDownloader;
    ///
    /// assert_eq!(
    ///     ModelDownloader::url_to_model_id("https://huggingface.co/onnx-community/BiRefNet-ONNX"),
    ///     "onnx-community--BiRefNet-ONNX"
    /// );
    /// assert!(ModelDownloader::url_to_model_id("https://example.com/m.onnx").starts_with("url-"));
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        if let Some(repo) = url.strip_prefix(HUGGINGFACE_PREFIX) {
            return repo.trim_end_matches('/').replace('/', "--");
        }
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        format!("url-{}", digest.get(..16).unwrap_or(&digest))
    }

    /// Whether `url` names a whole `HuggingFace` repository rather than one file
    #[must_use]
    pub fn is_repository_url(url: &str) -> bool {
        url.strip_prefix(HUGGINGFACE_PREFIX)
            .map(|repo| repo.trim_end_matches('/'))
            .is_some_and(|repo| {
                let parts: Vec<&str> = repo.split('/').collect();
                parts.len() == 2 && parts.iter().all(|part| !part.is_empty())
            })
    }

    /// Make the model available locally and return its path
    ///
    /// Repository URLs resolve to a model directory, file URLs to the `.onnx`
    /// file. Cached models are returned without network access; when an
    /// expected SHA-256 is given for a file URL, a cached copy that does not
    /// match is downloaded again.
    ///
    /// # Errors
    /// - URL is not `http(s)`
    /// - Network errors or non-success status
    /// - SHA-256 mismatch after download
    /// - File system errors while writing the cache
    pub async fn fetch_model(&self, url: &str, expected_sha256: Option<&str>) -> Result<PathBuf> {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(BgRemovalError::invalid_config(format!(
                "Model URL must use http or https: {}",
                url
            )));
        }

        let model_id = Self::url_to_model_id(url);
        let model_dir = self.cache_dir.join(&model_id);
        tracing::info!(url, model_id = %model_id, "Resolving model");

        if Self::is_repository_url(url) {
            if expected_sha256.is_some() {
                tracing::warn!("Ignoring model SHA-256 for repository URL");
            }
            self.fetch_repository(url, &model_dir).await?;
            return Ok(model_dir);
        }

        let file_name = url
            .rsplit('/')
            .next()
            .filter(|name| name.ends_with(".onnx"))
            .unwrap_or("model.onnx");
        let model_path = model_dir.join(file_name);

        if model_path.is_file() {
            if Self::verify_file_integrity(&model_path, expected_sha256)? {
                tracing::info!(path = %model_path.display(), "Using cached model");
                return Ok(model_path);
            }
            tracing::warn!(path = %model_path.display(), "Cached model failed verification, downloading again");
        }

        self.download_file(url, &model_path, expected_sha256).await?;
        Ok(model_path)
    }

    async fn fetch_repository(&self, url: &str, model_dir: &Path) -> Result<()> {
        let cached = ONNX_FILES
            .iter()
            .any(|(file, _)| model_dir.join(file).is_file());
        if cached {
            tracing::info!(path = %model_dir.display(), "Using cached model repository");
            return Ok(());
        }

        let raw_base = format!("{}/resolve/main/", url.trim_end_matches('/'));

        for file_name in CONFIG_FILES {
            let file_url = format!("{}{}", raw_base, file_name);
            if let Err(e) = self
                .download_file(&file_url, &model_dir.join(file_name), None)
                .await
            {
                tracing::warn!(file = file_name, error = %e, "Optional model file not downloaded");
            }
        }

        let mut downloaded_models = 0;
        for (file_path, variant) in ONNX_FILES {
            let file_url = format!("{}{}", raw_base, file_path);
            match self
                .download_file(&file_url, &model_dir.join(file_path), None)
                .await
            {
                Ok(()) => {
                    downloaded_models += 1;
                    tracing::info!(variant, "Downloaded model variant");
                },
                Err(e) => tracing::warn!(variant, error = %e, "Failed to download model variant"),
            }
        }

        if downloaded_models == 0 {
            return Err(BgRemovalError::network_error(
                format!("Failed to download any ONNX model from {}", url),
                "no model files found",
            ));
        }
        Ok(())
    }

    /// Stream `url` into `local_path` through a `.part` file
    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        tracing::debug!(url, path = %local_path.display(), "Downloading");

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create directory", parent, &e))?;
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            BgRemovalError::network_error(format!("Failed to download {}", url), e)
        })?;
        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {}", url),
                format!("HTTP {}", response.status()),
            ));
        }

        let part_path = Self::part_path(local_path);
        let result = Self::write_stream(response, &part_path).await.and_then(|bytes| {
            if !Self::verify_file_integrity(&part_path, expected_sha256)? {
                return Err(BgRemovalError::model(format!(
                    "SHA-256 mismatch for {}",
                    url
                )));
            }
            fs::rename(&part_path, local_path).map_err(|e| {
                BgRemovalError::file_io_error("move downloaded model into cache", local_path, &e)
            })?;
            Ok(bytes)
        });

        match result {
            Ok(bytes) => {
                tracing::debug!(bytes, path = %local_path.display(), "Download complete");
                Ok(())
            },
            Err(e) => {
                if part_path.exists() {
                    if let Err(cleanup_err) = fs::remove_file(&part_path) {
                        tracing::warn!(error = %cleanup_err, "Failed to remove partial download");
                    }
                }
                Err(e)
            },
        }
    }

    async fn write_stream(response: reqwest::Response, part_path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", part_path, &e))?;

        let mut reader = StreamReader::new(Box::pin(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        ));

        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", part_path, &e))?;
        Ok(bytes)
    }

    fn part_path(local_path: &Path) -> PathBuf {
        let mut name = local_path.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        local_path.with_file_name(name)
    }

    /// Verify a file against an expected SHA-256 hex digest
    ///
    /// Returns `true` when no digest is expected. Comparison ignores case.
    ///
    /// # Errors
    /// Returns `BgRemovalError::Io` when the file cannot be read
    pub fn verify_file_integrity(file_path: &Path, expected_sha256: Option<&str>) -> Result<bool> {
        let Some(expected) = expected_sha256 else {
            return Ok(true);
        };

        let mut file = fs::File::open(file_path).map_err(|e| {
            BgRemovalError::file_io_error("read file for verification", file_path, &e)
        })?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| {
            BgRemovalError::file_io_error("read file for verification", file_path, &e)
        })?;
        let actual = format!("{:x}", hasher.finalize());

        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(true)
        } else {
            tracing::warn!(
                path = %file_path.display(),
                expected,
                actual = %actual,
                "File integrity check failed"
            );
            Ok(false)
        }
    }
}
