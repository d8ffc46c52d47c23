use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::llm;
use crate::prompt::extract_final_prompts;
use crate::state::AppState;

use super::{error_response, require_json};

#[derive(Deserialize)]
pub struct AssistRequest {
    #[serde(default)]
    prompt: String,
}

/// Returns the assistant's reply verbatim together with every prompt block
/// extracted from it.
pub async fn assist(
    State(state): State<AppState>,
    body: Result<Json<AssistRequest>, JsonRejection>,
) -> Response {
    let request = match require_json(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if request.prompt.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Prompt is required");
    }

    match llm::request_prompt_assistance(&state.config, &request.prompt).await {
        Ok(reply) => {
            let final_prompts = extract_final_prompts(&reply);
            Json(json!({ "prompt": reply, "finalPrompts": final_prompts })).into_response()
        }
        Err(err) => {
            error!("Prompt assistance failed: {err:#}");
            error_response(StatusCode::BAD_GATEWAY, "Failed to generate prompt")
        }
    }
}
