use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::state::AppState;
use crate::styles::{new_custom_id, StyleCatalogError, StylePreset};

use super::{error_response, require_json};

/// Built-ins first, then the persisted customs.
pub async fn list(State(state): State<AppState>) -> Response {
    let presets = state.styles.lock().presets();
    Json(json!({ "styles": presets })).into_response()
}

#[derive(Deserialize)]
pub struct SaveStyleRequest {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    prompt: String,
    icon: Option<String>,
}

/// Creates a custom preset, or replaces the custom preset whose id matches.
/// Built-in ids are rejected.
pub async fn save(
    State(state): State<AppState>,
    body: Result<Json<SaveStyleRequest>, JsonRejection>,
) -> Response {
    let request = match require_json(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if request.name.trim().is_empty() || request.prompt.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Style name and prompt are required");
    }

    let preset = StylePreset {
        id: request.id.unwrap_or_else(new_custom_id),
        name: request.name,
        prompt: request.prompt,
        icon: request.icon,
        is_custom: true,
    };

    match state.styles.lock().save(preset) {
        Ok(saved) => Json(saved).into_response(),
        Err(err @ StyleCatalogError::BuiltIn(_)) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(StyleCatalogError::Persist(err)) => {
            error!("Failed to persist style: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save style")
        }
    }
}

/// Built-in and unknown ids answer `removed: false` rather than an error.
pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.styles.lock().delete(&id) {
        Ok(removed) => Json(json!({ "removed": removed })).into_response(),
        Err(err) => {
            error!("Failed to persist style deletion: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete style")
        }
    }
}
