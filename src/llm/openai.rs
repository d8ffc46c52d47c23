use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{Config, PROMPT_ASSIST_SYSTEM_PROMPT};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_upstream_timing;

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

/// Pulls the assistant text out of a chat completion response.
fn extract_reply_text(response: &Value) -> String {
    response
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("message"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Asks the prompt assistant to rework a raw prompt and returns the reply
/// text of the first choice.
pub async fn request_prompt_assistance(config: &Config, user_prompt: &str) -> Result<String> {
    let payload = json!({
        "model": config.openai_model,
        "messages": [
            { "role": "system", "content": PROMPT_ASSIST_SYSTEM_PROMPT },
            { "role": "user", "content": user_prompt }
        ],
    });

    let model = config.openai_model.as_str();
    log_upstream_timing("openai", model, "prompt_assist", None, || async {
        let response = call_chat_completions_api(config, &payload).await?;
        let reply = extract_reply_text(&response);
        if reply.trim().is_empty() {
            warn!("Prompt assistant returned empty content");
        }
        Ok(reply)
    })
    .await
}

async fn call_chat_completions_api(config: &Config, payload: &Value) -> Result<Value> {
    debug!(
        "Chat completion request: model={}, prompt={:?}",
        payload.get("model").and_then(|v| v.as_str()).unwrap_or("unknown"),
        payload
            .pointer("/messages/1/content")
            .and_then(|v| v.as_str())
            .map(|content| truncate_for_log(content, 200))
            .unwrap_or_default()
    );

    let client = get_http_client();
    let response = client
        .post(format!(
            "{}/chat/completions",
            config.openai_base_url.trim_end_matches('/')
        ))
        .header("Authorization", format!("Bearer {}", config.openai_api_key))
        .timeout(Duration::from_secs(60))
        .json(payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!("OpenAI API error: status={}, body={}", status, body_summary);
        let detail = message.unwrap_or(body_summary);
        return Err(anyhow!(
            "OpenAI request failed with status {}: {}",
            status,
            detail
        ));
    }

    Ok(response.json::<Value>().await?)
}
