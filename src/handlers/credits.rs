use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::llm;
use crate::state::AppState;

use super::{error_response, require_json};

pub async fn fetch(State(state): State<AppState>) -> Response {
    match llm::fetch_credits(&state.config).await {
        Ok(balance) => Json(balance).into_response(),
        Err(err) => {
            error!("Failed to fetch credits: {err:#}");
            error_response(StatusCode::BAD_GATEWAY, "Failed to fetch credits")
        }
    }
}

#[derive(Deserialize)]
pub struct SpendReport {
    #[serde(rename = "computeCost", default)]
    compute_cost: f64,
}

/// The client reports what a generation cost; the real balance lives
/// upstream, so the figure is acknowledged and echoed back.
pub async fn report_spend(body: Result<Json<SpendReport>, JsonRejection>) -> Response {
    match require_json(body) {
        Ok(report) => Json(json!({ "credits": report.compute_cost })).into_response(),
        Err(response) => response,
    }
}
