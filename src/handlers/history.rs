use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::llm;
use crate::state::AppState;
use crate::utils::http::get_http_client;

use super::generate::{record_completion, SettingsPayload};
use super::{error_response, require_index, require_json};

pub async fn list(State(state): State<AppState>) -> Response {
    let records = state.history.lock().records().to_vec();
    Json(json!({ "images": records })).into_response()
}

/// An out-of-range index answers `updated: false` rather than an error,
/// mirroring the store contract.
pub async fn toggle_like(
    State(state): State<AppState>,
    index: Result<Path<usize>, PathRejection>,
) -> Response {
    let index = match require_index(index) {
        Ok(index) => index,
        Err(response) => return response,
    };
    match state.history.lock().toggle_liked(index) {
        Ok(updated) => Json(json!({ "updated": updated })).into_response(),
        Err(err) => {
            error!("Failed to persist like toggle: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update record")
        }
    }
}

/// Re-runs the recorded prompt with the caller's settings (an absent body
/// means the defaults) and a freshly drawn seed; the completion is recorded
/// like any first-class generation.
pub async fn vary(
    State(state): State<AppState>,
    index: Result<Path<usize>, PathRejection>,
    body: Result<Json<SettingsPayload>, JsonRejection>,
) -> Response {
    let index = match require_index(index) {
        Ok(index) => index,
        Err(response) => return response,
    };
    let prompt = {
        let history = state.history.lock();
        match history.get(index) {
            Some(record) => record.prompt.clone(),
            None => return error_response(StatusCode::NOT_FOUND, "History record not found"),
        }
    };
    let payload = match body {
        Err(JsonRejection::MissingJsonContentType(_)) => SettingsPayload::default(),
        body => match require_json(body) {
            Ok(payload) => payload,
            Err(response) => return response,
        },
    };
    let settings = match payload.resolve() {
        Ok(settings) => settings,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };
    let seed = llm::random_seed();

    match llm::generate_image(&state.config, &prompt, &settings, Some(seed)).await {
        Ok(result) => {
            record_completion(&state, &prompt, &result);
            Json(result).into_response()
        }
        Err(err) => {
            error!("Failed to vary image: {}", err.0);
            error_response(StatusCode::BAD_GATEWAY, "Failed to generate image")
        }
    }
}

/// Proxies the stored image url back as an attachment with a sniffed
/// content type.
pub async fn download(
    State(state): State<AppState>,
    index: Result<Path<usize>, PathRejection>,
) -> Response {
    let index = match require_index(index) {
        Ok(index) => index,
        Err(response) => return response,
    };
    let record = {
        let history = state.history.lock();
        match history.get(index) {
            Some(record) => record.clone(),
            None => return error_response(StatusCode::NOT_FOUND, "History record not found"),
        }
    };

    let response = match get_http_client().get(&record.url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            error!("Image host answered {} for {}", response.status(), record.url);
            return error_response(StatusCode::BAD_GATEWAY, "Failed to download image");
        }
        Err(err) => {
            error!("Failed to download image from {}: {err}", record.url);
            return error_response(StatusCode::BAD_GATEWAY, "Failed to download image");
        }
    };

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to read image body from {}: {err}", record.url);
            return error_response(StatusCode::BAD_GATEWAY, "Failed to download image");
        }
    };

    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("image/png");
    let disposition = format!(
        "attachment; filename=\"flux-image-{}.png\"",
        record.timestamp
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    confirm: bool,
}

/// The body must carry `confirm: true`; anything else leaves the store
/// untouched.
pub async fn clear(
    State(state): State<AppState>,
    body: Result<Json<ClearRequest>, JsonRejection>,
) -> Response {
    let request = match require_json(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if !request.confirm {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Clearing history requires confirm: true",
        );
    }

    match state.history.lock().clear() {
        Ok(()) => Json(json!({ "cleared": true })).into_response(),
        Err(err) => {
            error!("Failed to clear history: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear history")
        }
    }
}
