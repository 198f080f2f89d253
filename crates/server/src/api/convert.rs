//! Conversion endpoints: named profiles and ad-hoc operations.
//!
//! Request bodies are the raw media bytes. Responses carry the converted
//! bytes with the output media type; errors are JSON.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use mediaforge_core::{
    ConversionError, ConversionOptions, ConversionResult, Operation, ServiceError,
};

use crate::state::AppState;

/// Header naming the sniffed input format.
pub const SOURCE_FORMAT_HEADER: &str = "x-source-format";
/// Header with the conversion time in milliseconds.
pub const ELAPSED_HEADER: &str = "x-conversion-ms";

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// Errors returned by conversion handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Query parameters that do not describe a valid request.
    BadRequest(String),
    /// The conversion itself failed.
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

/// HTTP status for a conversion error kind.
pub fn status_for(kind: &ConversionError) -> StatusCode {
    match kind {
        ConversionError::UnknownProfile { .. } => StatusCode::NOT_FOUND,
        ConversionError::UnknownFormat(_) | ConversionError::IncompatibleInput { .. } => {
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        }
        ConversionError::InvalidOptions { .. }
        | ConversionError::InvalidOperation { .. }
        | ConversionError::UnsupportedContainer { .. } => StatusCode::BAD_REQUEST,
        ConversionError::ConversionFailed { .. } | ConversionError::EngineUnavailable { .. } => {
            StatusCode::BAD_GATEWAY
        }
        ConversionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ConversionError::StageIo(_) | ConversionError::ReadBack { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: reason,
                    kind: "bad_request".to_string(),
                    diagnostics: None,
                },
            ),
            Self::Service(err) => {
                let status = status_for(&err.kind);
                if status.is_server_error() {
                    warn!(error = %err, status = status.as_u16(), "Conversion request failed");
                }
                (
                    status,
                    ErrorResponse {
                        error: err.to_string(),
                        kind: err.kind.kind_name().to_string(),
                        diagnostics: err.diagnostics().map(str::to_string),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Caller options shared by every conversion endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct OptionsQuery {
    /// Output container override.
    pub container: Option<String>,
    /// Extra engine arguments, space separated.
    pub extra: Option<String>,
    /// Deadline in seconds, capped at the configured deadline.
    pub timeout_secs: Option<u64>,
}

impl OptionsQuery {
    fn into_options(self, max_timeout: Duration) -> ConversionOptions {
        let mut options = ConversionOptions::new();
        if let Some(container) = self.container {
            options = options.with_container(container);
        }
        if let Some(extra) = self.extra {
            options = options.with_arg_line(&extra);
        }
        if let Some(secs) = self.timeout_secs {
            options = options.with_timeout(Duration::from_secs(secs).min(max_timeout));
        }
        options
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, ApiError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ApiError::BadRequest(format!("{name} must be a non-negative number of seconds"))
    })
}

async fn respond(
    operation: &str,
    result: Result<ConversionResult, ServiceError>,
) -> Result<Response, ApiError> {
    let ConversionResult {
        source,
        extension,
        media_type,
        output,
        elapsed,
    } = result?;
    let bytes = output.into_bytes().await.map_err(|e| {
        ServiceError::new(
            operation,
            Some(&extension),
            ConversionError::ReadBack {
                reason: e.to_string(),
            },
        )
    })?;

    let mut response = (StatusCode::OK, bytes).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&media_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(SOURCE_FORMAT_HEADER, HeaderValue::from_static(source.extension));
    headers.insert(ELAPSED_HEADER, HeaderValue::from(elapsed.as_millis() as u64));
    Ok(response)
}

async fn run(
    state: &AppState,
    body: &[u8],
    operation: Operation,
    options: OptionsQuery,
) -> Result<Response, ApiError> {
    let label = operation.label();
    let result = state
        .service()
        .run_operation(body, operation, options.into_options(state.max_timeout()))
        .await;
    respond(&label, result).await
}

/// `POST /convert/{profile}`
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Path(profile): Path<String>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let result = state
        .service()
        .convert(&body, &profile, options.into_options(state.max_timeout()))
        .await;
    respond(&profile, result).await
}

#[derive(Debug, Deserialize)]
pub struct CropParams {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

/// `POST /ops/crop`
pub async fn crop(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CropParams>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let operation = Operation::crop(params.width, params.height, params.x, params.y);
    run(&state, &body, operation, options).await
}

#[derive(Debug, Deserialize)]
pub struct ScaleParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// `POST /ops/scale`
pub async fn scale(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScaleParams>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let operation = Operation::scale_to(params.width, params.height);
    run(&state, &body, operation, options).await
}

#[derive(Debug, Deserialize)]
pub struct TrimParams {
    /// Start in seconds.
    pub start: f64,
    /// End in seconds.
    pub end: f64,
}

/// `POST /ops/trim`
pub async fn trim(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrimParams>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let start = seconds("start", params.start)?;
    let end = seconds("end", params.end)?;
    let operation = Operation::trim_range(start, end);
    run(&state, &body, operation, options).await
}

/// `POST /ops/container/{name}`
pub async fn container(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    run(&state, &body, Operation::to_container(name), options).await
}

#[derive(Debug, Deserialize)]
pub struct FrameParams {
    /// Timestamp in seconds.
    #[serde(default)]
    pub at: f64,
}

/// `POST /ops/frame`
pub async fn frame(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FrameParams>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let operation = Operation::extract_frame(seconds("at", params.at)?);
    run(&state, &body, operation, options).await
}

#[derive(Debug, Deserialize)]
pub struct FramesParams {
    /// Frames per second to sample.
    #[serde(default = "default_rate")]
    pub rate: f64,
    pub max_frames: Option<u32>,
}

fn default_rate() -> f64 {
    1.0
}

/// `POST /ops/frames`, answered with a Motion JPEG stream.
pub async fn frames(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FramesParams>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let operation = Operation::extract_frames(params.rate, params.max_frames);
    run(&state, &body, operation, options).await
}

#[derive(Debug, Deserialize)]
pub struct WaveformParams {
    #[serde(default = "default_waveform_width")]
    pub width: u32,
    #[serde(default = "default_waveform_height")]
    pub height: u32,
}

fn default_waveform_width() -> u32 {
    640
}

fn default_waveform_height() -> u32 {
    120
}

/// `POST /ops/waveform`
pub async fn waveform(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WaveformParams>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let operation = Operation::waveform(params.width, params.height);
    run(&state, &body, operation, options).await
}

/// `POST /ops/reverse`
pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(options): Query<OptionsQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    run(&state, &body, Operation::reverse(), options).await
}
