//! HTTP surface: `/remove-bg`, `/ping` and `/health`

use crate::{
    config::ServerConfig,
    error::{BgRemovalError, Result},
    input::{ContentKind, FormPayload, JsonPayload, RequestPayload},
    processor::RemovalPipeline,
    types::FIELD_IMAGE_FILE,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::Instrument;

/// Header carrying the per-request id on responses
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Arc<RemovalPipeline>,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: RemovalPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Error response: a status code and a `{"error": "<message>"}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map an extractor rejection; oversized bodies keep their 413
    fn rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self { status, message }
        } else {
            BgRemovalError::malformed_request(message).into()
        }
    }
}

impl From<BgRemovalError> for ApiError {
    fn from(error: BgRemovalError) -> Self {
        let status = match &error {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            BgRemovalError::Fetch(_) => StatusCode::BAD_GATEWAY,
            BgRemovalError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), error = %self.message, "Request failed");
        } else {
            tracing::warn!(status = self.status.as_u16(), error = %self.message, "Request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Build the application router
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/remove-bg", post(remove_background))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

/// Tag each request with a v4 UUID on its span and response
async fn request_span(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| tracing::debug!(status = response.status().as_u16(), "Response sent"));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn remove_background(
    State(state): State<AppState>,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    let kind = ContentKind::classify(content_type.as_deref())?;

    let payload = match kind {
        ContentKind::Form => RequestPayload::Form(read_form(request, &state).await?),
        ContentKind::Json => {
            let body = Bytes::from_request(request, &state)
                .await
                .map_err(|e| ApiError::rejection(e.status(), e.body_text()))?;
            RequestPayload::Json(JsonPayload::from_slice(&body)?)
        },
    };

    let encoded = state.pipeline.process(payload).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoded.mime_type())],
        encoded.bytes,
    )
        .into_response())
}

/// Collect the `image_file` part and text fields of a multipart body
async fn read_form(request: Request, state: &AppState) -> std::result::Result<FormPayload, ApiError> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::rejection(e.status(), e.body_text()))?;
    let mut form = FormPayload::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejection(e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == FIELD_IMAGE_FILE {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::rejection(e.status(), e.body_text()))?;
            if form.file.is_none() {
                form = form.with_file(bytes.to_vec());
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::rejection(e.status(), e.body_text()))?;
            form = form.with_field(name, text);
        }
    }

    Ok(form)
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "API is running" }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.pipeline.is_model_loaded(),
    }))
}

/// Bind and serve until Ctrl-C
///
/// # Errors
/// Returns `BgRemovalError::Io` if the address cannot be bound or the server fails
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| BgRemovalError::file_io_error("bind", &address, &e))?;
    tracing::info!(address = %address, "Listening");

    axum::serve(listener, create_router(state, config.max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
