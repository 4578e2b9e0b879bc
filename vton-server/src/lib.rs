//! HTTP boundary for the try-on service: route table, wire DTOs, and the
//! mapping from classified core failures to status codes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{Field, Multipart};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use vton_core::{DeviceMap, ResidencyState, TryOnError, TryOnParams, TryOnResult, TryOnService};

mod stub;

pub use stub::StubPipeline;

#[derive(Clone)]
pub struct AppState {
    service: Arc<TryOnService>,
}

impl AppState {
    pub fn new(service: Arc<TryOnService>) -> Self {
        Self { service }
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/try-on", post(try_on))
        .route("/try-on-base64", post(try_on_base64))
        .route("/load-models", post(load_models))
        .route("/unload-models", post(unload_models))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- Responses ---

#[derive(Serialize)]
struct TryOnResponse {
    success: bool,
    #[serde(flatten)]
    outcome: TryOnResult,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    device: DeviceMap,
    residency: ResidencyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    accelerator_memory_bytes: Option<u64>,
}

#[derive(Serialize)]
struct ResidencyResponse {
    message: &'static str,
    residency: ResidencyState,
}

// --- Handlers ---

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.service.status();
    Json(json!({
        "message": "vton server is running",
        "device": status.device,
        "residency": status.state,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.service.status();
    Json(HealthResponse {
        status: "healthy",
        device: status.device,
        residency: status.state,
        accelerator_memory_bytes: state.service.device_memory_bytes(),
    })
}

async fn try_on(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TryOnResponse>, ApiError> {
    let (human, garment, params) = read_multipart(multipart).await?;
    let outcome = state.service.try_on(&human, &garment, params).await?;
    Ok(Json(TryOnResponse { success: true, outcome }))
}

#[derive(Deserialize)]
struct TryOnBase64Form {
    human_image_b64: String,
    garment_image_b64: String,
    garment_description: Option<String>,
    auto_mask: Option<String>,
    auto_crop: Option<String>,
    denoise_steps: Option<String>,
    seed: Option<String>,
}

async fn try_on_base64(
    State(state): State<AppState>,
    Form(form): Form<TryOnBase64Form>,
) -> Result<Json<TryOnResponse>, ApiError> {
    let scalars = RawScalars {
        garment_description: form.garment_description,
        auto_mask: form.auto_mask,
        auto_crop: form.auto_crop,
        denoise_steps: form.denoise_steps,
        seed: form.seed,
    };
    let outcome = state
        .service
        .try_on_base64(&form.human_image_b64, &form.garment_image_b64, scalars.into_params()?)
        .await?;
    Ok(Json(TryOnResponse { success: true, outcome }))
}

async fn load_models(State(state): State<AppState>) -> Result<Json<ResidencyResponse>, ApiError> {
    let status = state.service.load_model().await?;
    Ok(Json(ResidencyResponse {
        message: "models loaded to accelerator",
        residency: status.state,
    }))
}

async fn unload_models(State(state): State<AppState>) -> Json<ResidencyResponse> {
    let status = state.service.unload_model().await;
    Json(ResidencyResponse {
        message: "models unloaded from accelerator",
        residency: status.state,
    })
}

// --- Form parsing ---

/// Scalar form fields before type coercion; both try-on routes share the
/// same coercion rules and report the offending field on failure.
#[derive(Default)]
struct RawScalars {
    garment_description: Option<String>,
    auto_mask: Option<String>,
    auto_crop: Option<String>,
    denoise_steps: Option<String>,
    seed: Option<String>,
}

impl RawScalars {
    fn into_params(self) -> Result<TryOnParams, TryOnError> {
        Ok(TryOnParams {
            garment_description: self.garment_description.unwrap_or_default(),
            auto_mask: parse_bool_field("auto_mask", self.auto_mask)?,
            auto_crop: parse_bool_field("auto_crop", self.auto_crop)?,
            denoise_steps: parse_number_field("denoise_steps", self.denoise_steps)?,
            seed: parse_number_field("seed", self.seed)?,
        })
    }
}

fn parse_bool_field(field: &'static str, value: Option<String>) -> Result<Option<bool>, TryOnError> {
    let Some(value) = value else { return Ok(None) };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        other => Err(TryOnError::validation(field, format!("expected a boolean, got {other:?}"))),
    }
}

fn parse_number_field<T: FromStr>(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<T>, TryOnError>
where
    T::Err: fmt::Display,
{
    let Some(value) = value else { return Ok(None) };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| TryOnError::validation(field, format!("expected an integer: {e}")))
}

async fn read_multipart(mut multipart: Multipart) -> Result<(Bytes, Bytes, TryOnParams), TryOnError> {
    let mut human = None;
    let mut garment = None;
    let mut scalars = RawScalars::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TryOnError::validation("multipart", e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_owned) else { continue };
        match name.as_str() {
            "human_image" => human = Some(read_file_field(field, "human_image").await?),
            "garment_image" => garment = Some(read_file_field(field, "garment_image").await?),
            "garment_description" => {
                scalars.garment_description =
                    Some(read_text_field(field, "garment_description").await?)
            }
            "auto_mask" => scalars.auto_mask = Some(read_text_field(field, "auto_mask").await?),
            "auto_crop" => scalars.auto_crop = Some(read_text_field(field, "auto_crop").await?),
            "denoise_steps" => {
                scalars.denoise_steps = Some(read_text_field(field, "denoise_steps").await?)
            }
            "seed" => scalars.seed = Some(read_text_field(field, "seed").await?),
            _ => {}
        }
    }

    let human = human.ok_or_else(|| TryOnError::validation("human_image", "missing image file"))?;
    let garment =
        garment.ok_or_else(|| TryOnError::validation("garment_image", "missing image file"))?;
    Ok((human, garment, scalars.into_params()?))
}

async fn read_file_field(field: Field<'_>, name: &'static str) -> Result<Bytes, TryOnError> {
    field
        .bytes()
        .await
        .map_err(|e| TryOnError::validation(name, format!("unreadable upload: {e}")))
}

async fn read_text_field(field: Field<'_>, name: &'static str) -> Result<String, TryOnError> {
    field
        .text()
        .await
        .map_err(|e| TryOnError::validation(name, format!("unreadable field: {e}")))
}

// --- Error mapping ---

/// Wire rendition of [`TryOnError`]; each kind has a fixed status code.
pub struct ApiError(TryOnError);

impl From<TryOnError> for ApiError {
    fn from(err: TryOnError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TryOnError::Validation { .. } => StatusCode::BAD_REQUEST,
            TryOnError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TryOnError::Residency { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TryOnError::Generation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(kind = self.0.kind(), "request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.kind(),
            field: self.0.field(),
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
