use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::history::GenerationRecord;
use crate::llm;
use crate::settings::{Settings, SettingsError};
use crate::state::AppState;

use super::{error_response, require_json};

/// Settings fields as a request carries them. Absent fields fall back to
/// the client defaults before validation.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPayload {
    #[serde(rename = "imageSize")]
    image_size: Option<String>,
    steps: Option<u32>,
    guidance: Option<f64>,
}

impl SettingsPayload {
    pub fn resolve(&self) -> Result<Settings, SettingsError> {
        let defaults = Settings::default();
        Settings::from_parts(
            self.image_size.as_deref().unwrap_or(defaults.image_size.as_str()),
            self.steps.unwrap_or(defaults.steps),
            self.guidance.unwrap_or(defaults.guidance),
        )
    }
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    prompt: String,
    #[serde(flatten)]
    settings: SettingsPayload,
    seed: Option<i64>,
}

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let request = match require_json(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if request.prompt.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Prompt is required");
    }
    let settings = match request.settings.resolve() {
        Ok(settings) => settings,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    match llm::generate_image(&state.config, &request.prompt, &settings, request.seed).await {
        Ok(result) => {
            record_completion(&state, &request.prompt, &result);
            Json(result).into_response()
        }
        Err(err) => {
            error!("Failed to generate image: {}", err.0);
            error_response(StatusCode::BAD_GATEWAY, "Failed to generate image")
        }
    }
}

/// Appends one history record for a completed generation. A payload with no
/// image url records nothing; a failed persist is logged and the in-memory
/// record kept, the response itself is unaffected.
pub(super) fn record_completion(state: &AppState, prompt: &str, result: &Value) {
    let url = match result.pointer("/images/0/url").and_then(|v| v.as_str()) {
        Some(url) => url,
        None => {
            warn!("Generation result carried no image url, nothing recorded");
            return;
        }
    };
    let record = GenerationRecord::new(url, prompt);
    let mut history = state.history.lock();
    if let Err(err) = history.append(record) {
        error!("Failed to persist generation history: {err:#}");
    }
    info!("Recorded generation, history size now {}", history.len());
}
