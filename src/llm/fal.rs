use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::settings::Settings;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_upstream_timing;

#[derive(Debug, thiserror::Error)]
#[error("Image generation failed: {0}")]
pub struct ImageGenerationError(pub String);

/// Exclusive upper bound for generation seeds, matching the client's
/// Math.random range.
const SEED_RANGE: i64 = 2_147_483_647;

/// Uniform seed in [0, 2^31 - 1). A fresh one is drawn per variation so
/// repeated generations of the same prompt differ unless a seed is pinned.
pub fn random_seed() -> i64 {
    rand::thread_rng().gen_range(0..SEED_RANGE)
}

/// Maps validated settings and a prompt into the diffusion upstream's input
/// shape.
pub fn build_generation_input(prompt: &str, settings: &Settings, seed: Option<i64>) -> Value {
    let (width, height) = settings.image_size.dimensions();
    let mut input = json!({
        "prompt": prompt,
        "image_size": {
            "width": width,
            "height": height
        },
        "num_inference_steps": settings.steps,
        "guidance_scale": settings.guidance,
    });
    if let Some(seed) = seed {
        if let Some(object) = input.as_object_mut() {
            object.insert("seed".to_string(), json!(seed));
        }
    }
    input
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn summarize_input(input: &Value) -> String {
    let prompt = input.get("prompt").and_then(|v| v.as_str()).unwrap_or("");
    let width = input
        .pointer("/image_size/width")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let height = input
        .pointer("/image_size/height")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let steps = input
        .get("num_inference_steps")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let seed = input.get("seed").and_then(|v| v.as_i64());
    format!(
        "prompt={:?}, size={}x{}, steps={}, seed={:?}",
        truncate_for_log(prompt, 200),
        width,
        height,
        steps,
        seed
    )
}

/// Runs the diffusion model and returns the upstream JSON verbatim. Single
/// attempt; any failure is terminal for this request.
pub async fn generate_image(
    config: &Config,
    prompt: &str,
    settings: &Settings,
    seed: Option<i64>,
) -> Result<Value, ImageGenerationError> {
    let input = build_generation_input(prompt, settings, seed);
    debug!("FLUX request: {}", summarize_input(&input));

    let model = config.flux_model.as_str();
    let url = format!("{}/{}", config.fal_base_url.trim_end_matches('/'), model);

    log_upstream_timing("fal", model, "generate_image", None, || async {
        call_flux_api(config, &url, &input).await
    })
    .await
    .map_err(|err| ImageGenerationError(err.to_string()))
}

async fn call_flux_api(config: &Config, url: &str, input: &Value) -> Result<Value> {
    let client = get_http_client();
    let response = client
        .post(url)
        .header("Authorization", format!("Key {}", config.fal_key))
        .timeout(Duration::from_secs(120))
        .json(input)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!("FLUX API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "FLUX request failed with status {}: {}",
            status,
            detail
        ));
    }

    let value = response.json::<Value>().await?;
    debug!(
        "FLUX response received: images={}",
        value
            .get("images")
            .and_then(|v| v.as_array())
            .map(|images| images.len())
            .unwrap_or(0)
    );
    Ok(value)
}

/// Fetches the account credit balance from the dashboard, returned verbatim.
pub async fn fetch_credits(config: &Config) -> Result<Value> {
    let url = format!(
        "{}/api/credits",
        config.fal_dashboard_base_url.trim_end_matches('/')
    );

    log_upstream_timing("fal", "dashboard", "fetch_credits", None, || async {
        let client = get_http_client();
        let response = client
            .get(&url)
            .header("Authorization", format!("Key {}", config.fal_key))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Credits API error: status={}, body={}",
                status, body_summary
            );
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Credits request failed with status {}: {}",
                status,
                detail
            ));
        }

        Ok(response.json::<Value>().await?)
    })
    .await
}
