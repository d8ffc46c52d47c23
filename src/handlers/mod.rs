pub mod assist;
pub mod credits;
pub mod generate;
pub mod history;
pub mod styles;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

/// Error body shape shared by every failure path.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Unwraps a JSON body, mapping extractor rejections onto the shared
/// `{ error }` shape while keeping their status.
pub(crate) fn require_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(error_response(rejection.status(), rejection.body_text())),
    }
}

/// Unwraps a numeric index segment the same way.
pub(crate) fn require_index(path: Result<Path<usize>, PathRejection>) -> Result<usize, Response> {
    match path {
        Ok(Path(index)) => Ok(index),
        Err(rejection) => Err(error_response(rejection.status(), rejection.body_text())),
    }
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route(
            "/api/credits",
            get(credits::fetch).post(credits::report_spend),
        )
        .route("/api/generate", post(generate::generate))
        .route("/api/prompt-assist", post(assist::assist))
        .route("/api/history", get(history::list))
        .route("/api/history/clear", post(history::clear))
        .route("/api/history/:index/like", post(history::toggle_like))
        .route("/api/history/:index/vary", post(history::vary))
        .route("/api/history/:index/download", get(history::download))
        .route("/api/styles", get(styles::list).post(styles::save))
        .route("/api/styles/:id", delete(styles::remove))
        .fallback(not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::{Body, Bytes};
    use axum::http::{header, HeaderMap, Request, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::build_router;
    use crate::config::Config;
    use crate::history::{GenerationRecord, HistoryStore, HISTORY_STORAGE_KEY};
    use crate::state::AppState;
    use crate::storage::{MemoryStore, StateStore};
    use crate::styles::StyleCatalog;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn test_config(base_url: &str) -> Config {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            log_level: "info".to_string(),
            fal_key: "test-fal-key".to_string(),
            fal_base_url: base_url.to_string(),
            fal_dashboard_base_url: base_url.to_string(),
            flux_model: "fal-ai/flux/dev".to_string(),
            openai_api_key: "test-openai-key".to_string(),
            openai_base_url: base_url.to_string(),
            openai_model: "gpt-4".to_string(),
            data_dir: PathBuf::from("data"),
            history_cap: Some(20),
            max_body_bytes: 262_144,
        }
    }

    fn test_state(config: Config, store: Arc<MemoryStore>) -> AppState {
        let history = HistoryStore::load(store.clone(), config.history_cap);
        let styles = StyleCatalog::load(store);
        AppState::new(config, history, styles)
    }

    /// App wired to a dead upstream, for routes that must never get there.
    fn offline_app() -> (Router, AppState) {
        let state = test_state(test_config("http://127.0.0.1:9"), Arc::new(MemoryStore::new()));
        (build_router(state.clone()), state)
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn send_json(app: &Router, method: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn send_get(app: &Router, path: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn send_get_raw(app: &Router, path: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes)
    }

    #[tokio::test]
    async fn generate_appends_one_record_with_prompt_and_url() {
        let stub = Router::new().route(
            "/fal-ai/flux/dev",
            post(|| async { Json(json!({"images": [{"url": "https://x/1.png"}], "seed": 7})) }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        let app = build_router(state.clone());

        let before = Utc::now().timestamp_millis();
        let (status, body) = send_json(
            &app,
            "POST",
            "/api/generate",
            json!({"prompt": "sunset", "imageSize": "1024x1024", "steps": 4, "guidance": 7.5}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"][0]["url"], "https://x/1.png");

        let history = state.history.lock();
        assert_eq!(history.len(), 1);
        let record = &history.records()[0];
        assert_eq!(record.prompt, "sunset");
        assert_eq!(record.url, "https://x/1.png");
        assert!(record.timestamp >= before);
        assert!(!record.liked);
    }

    #[tokio::test]
    async fn generate_forwards_settings_and_pinned_seed_upstream() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured_by_stub = captured.clone();
        let stub = Router::new().route(
            "/fal-ai/flux/dev",
            post(move |Json(input): Json<Value>| {
                let captured = captured_by_stub.clone();
                async move {
                    *captured.lock() = Some(input);
                    Json(json!({"images": [{"url": "https://x/1.png"}]}))
                }
            }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        let app = build_router(state);

        let (status, _) = send_json(
            &app,
            "POST",
            "/api/generate",
            json!({"prompt": "a fox", "imageSize": "1280x720", "steps": 28, "guidance": 9.0, "seed": 42}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let input = captured.lock().clone().unwrap();
        assert_eq!(input["prompt"], "a fox");
        assert_eq!(input["image_size"]["width"], 1280);
        assert_eq!(input["image_size"]["height"], 720);
        assert_eq!(input["num_inference_steps"], 28);
        assert_eq!(input["guidance_scale"], 9.0);
        assert_eq!(input["seed"], 42);
    }

    #[tokio::test]
    async fn generate_rejects_empty_prompt() {
        let (app, state) = offline_app();
        let (status, body) = send_json(&app, "POST", "/api/generate", json!({"prompt": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Prompt is required");
        assert!(state.history.lock().is_empty());
    }

    #[tokio::test]
    async fn generate_rejects_malformed_image_size() {
        let (app, _) = offline_app();
        let (status, body) = send_json(
            &app,
            "POST",
            "/api/generate",
            json!({"prompt": "a fox", "imageSize": "1280"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("Invalid image size '1280'"), "{message}");
    }

    #[tokio::test]
    async fn generate_maps_upstream_failure_to_uniform_error() {
        let stub = Router::new().route(
            "/fal-ai/flux/dev",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": {"message": "boom"}})),
                )
            }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        let app = build_router(state.clone());

        let (status, body) = send_json(
            &app,
            "POST",
            "/api/generate",
            json!({"prompt": "sunset", "imageSize": "1024x1024", "steps": 4, "guidance": 7.5}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to generate image");
        assert!(state.history.lock().is_empty());
    }

    #[tokio::test]
    async fn vary_reruns_recorded_prompt_with_fresh_seed() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured_by_stub = captured.clone();
        let stub = Router::new().route(
            "/fal-ai/flux/dev",
            post(move |Json(input): Json<Value>| {
                let captured = captured_by_stub.clone();
                async move {
                    *captured.lock() = Some(input);
                    Json(json!({"images": [{"url": "https://x/2.png"}]}))
                }
            }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        state
            .history
            .lock()
            .append(GenerationRecord::new("https://x/1.png", "a misty forest"))
            .unwrap();
        let app = build_router(state.clone());

        let (status, body) = send_json(
            &app,
            "POST",
            "/api/history/0/vary",
            json!({"imageSize": "720x1280"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"][0]["url"], "https://x/2.png");

        let input = captured.lock().clone().unwrap();
        assert_eq!(input["prompt"], "a misty forest");
        assert_eq!(input["image_size"]["width"], 720);
        assert_eq!(input["num_inference_steps"], 4);
        let seed = input["seed"].as_i64().unwrap();
        assert!((0..2_147_483_647).contains(&seed));

        let history = state.history.lock();
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].url, "https://x/2.png");
        assert_eq!(history.records()[0].prompt, "a misty forest");
    }

    #[tokio::test]
    async fn vary_unknown_index_is_not_found() {
        let (app, _) = offline_app();
        let (status, body) = send_json(&app, "POST", "/api/history/3/vary", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "History record not found");
    }

    #[tokio::test]
    async fn vary_rejects_malformed_json_body() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured_by_stub = captured.clone();
        let stub = Router::new().route(
            "/fal-ai/flux/dev",
            post(move |Json(input): Json<Value>| {
                let captured = captured_by_stub.clone();
                async move {
                    *captured.lock() = Some(input);
                    Json(json!({"images": [{"url": "https://x/2.png"}]}))
                }
            }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        state
            .history
            .lock()
            .append(GenerationRecord::new("https://x/1.png", "a misty forest"))
            .unwrap();
        let app = build_router(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/api/history/0/vary")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not valid json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!body["error"].as_str().unwrap().is_empty());

        assert!(captured.lock().is_none());
        assert_eq!(state.history.lock().len(), 1);
    }

    #[tokio::test]
    async fn vary_without_body_falls_back_to_default_settings() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured_by_stub = captured.clone();
        let stub = Router::new().route(
            "/fal-ai/flux/dev",
            post(move |Json(input): Json<Value>| {
                let captured = captured_by_stub.clone();
                async move {
                    *captured.lock() = Some(input);
                    Json(json!({"images": [{"url": "https://x/2.png"}]}))
                }
            }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        state
            .history
            .lock()
            .append(GenerationRecord::new("https://x/1.png", "a misty forest"))
            .unwrap();
        let app = build_router(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/api/history/0/vary")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let input = captured.lock().clone().unwrap();
        assert_eq!(input["prompt"], "a misty forest");
        assert_eq!(input["image_size"]["width"], 1024);
        assert_eq!(input["num_inference_steps"], 4);
        assert_eq!(state.history.lock().len(), 2);
    }

    #[tokio::test]
    async fn non_numeric_history_index_answers_the_shared_error_shape() {
        let (app, state) = offline_app();
        let (status, body) = send_json(&app, "POST", "/api/history/abc/like", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert!(state.history.lock().is_empty());
    }

    #[tokio::test]
    async fn unknown_routes_answer_the_shared_error_shape() {
        let (app, _) = offline_app();
        let (status, body) = send_get(&app, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn history_lists_records_newest_first() {
        let (app, state) = offline_app();
        {
            let mut history = state.history.lock();
            history
                .append(GenerationRecord::new("https://x/1.png", "first"))
                .unwrap();
            history
                .append(GenerationRecord::new("https://x/2.png", "second"))
                .unwrap();
        }

        let (status, body) = send_get(&app, "/api/history").await;
        assert_eq!(status, StatusCode::OK);
        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["prompt"], "second");
        assert_eq!(images[1]["prompt"], "first");
    }

    #[tokio::test]
    async fn like_route_reports_whether_a_record_changed() {
        let (app, state) = offline_app();
        state
            .history
            .lock()
            .append(GenerationRecord::new("https://x/1.png", "sunset"))
            .unwrap();

        let (status, body) = send_json(&app, "POST", "/api/history/0/like", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], true);
        assert!(state.history.lock().records()[0].liked);

        let (status, body) = send_json(&app, "POST", "/api/history/9/like", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], false);
    }

    #[tokio::test]
    async fn clear_requires_explicit_confirmation() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(test_config("http://127.0.0.1:9"), store.clone());
        state
            .history
            .lock()
            .append(GenerationRecord::new("https://x/1.png", "sunset"))
            .unwrap();
        let app = build_router(state.clone());

        let (status, _) = send_json(&app, "POST", "/api/history/clear", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.history.lock().len(), 1);

        let (status, body) =
            send_json(&app, "POST", "/api/history/clear", json!({"confirm": true})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], true);
        assert!(state.history.lock().is_empty());
        assert!(store.load(HISTORY_STORAGE_KEY).is_none());
    }

    #[tokio::test]
    async fn download_streams_attachment_with_sniffed_type() {
        let stub = Router::new().route("/image.png", get(|| async { PNG_HEADER.to_vec() }));
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        state
            .history
            .lock()
            .append(GenerationRecord::new(format!("{base}/image.png"), "sunset"))
            .unwrap();
        let timestamp = state.history.lock().records()[0].timestamp;
        let app = build_router(state);

        let (status, headers, bytes) = send_get_raw(&app, "/api/history/0/download").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"flux-image-{timestamp}.png\"")
        );
        assert_eq!(&bytes[..], &PNG_HEADER[..]);
    }

    #[tokio::test]
    async fn download_unknown_index_is_not_found() {
        let (app, _) = offline_app();
        let (status, body) = send_get(&app, "/api/history/0/download").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "History record not found");
    }

    #[tokio::test]
    async fn styles_crud_covers_customs_and_guards_built_ins() {
        let (app, _) = offline_app();

        let (status, body) = send_get(&app, "/api/styles").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["styles"].as_array().unwrap().len(), 6);

        let (status, saved) = send_json(
            &app,
            "POST",
            "/api/styles",
            json!({"name": "Vaporwave", "prompt": "vaporwave aesthetic, neon"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = saved["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("custom-"));
        assert_eq!(saved["isCustom"], true);

        let (status, body) = send_get(&app, "/api/styles").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["styles"].as_array().unwrap().len(), 7);

        let (status, body) = send_json(
            &app,
            "POST",
            "/api/styles",
            json!({"id": "anime", "name": "Impostor", "prompt": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("built in"));

        let (status, body) = send_json(
            &app,
            "DELETE",
            &format!("/api/styles/{id}"),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);

        let (status, body) = send_json(&app, "DELETE", "/api/styles/anime", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], false);

        let (_, body) = send_get(&app, "/api/styles").await;
        assert_eq!(body["styles"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn styles_save_requires_name_and_prompt() {
        let (app, _) = offline_app();
        let (status, body) =
            send_json(&app, "POST", "/api/styles", json!({"name": "", "prompt": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Style name and prompt are required");
    }

    #[tokio::test]
    async fn prompt_assist_returns_reply_and_extracted_blocks() {
        let stub = Router::new().route(
            "/chat/completions",
            post(|| async {
                Json(json!({
                    "choices": [{"message": {
                        "role": "assistant",
                        "content": "I understand. Here's an enhanced prompt:\n\nFinal prompt: A cat in space"
                    }}]
                }))
            }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        let app = build_router(state);

        let (status, body) = send_json(
            &app,
            "POST",
            "/api/prompt-assist",
            json!({"prompt": "cat in space"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["prompt"].as_str().unwrap().contains("Final prompt:"));
        assert_eq!(body["finalPrompts"], json!(["A cat in space"]));
    }

    #[tokio::test]
    async fn prompt_assist_rejects_empty_prompt() {
        let (app, _) = offline_app();
        let (status, body) = send_json(&app, "POST", "/api/prompt-assist", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Prompt is required");
    }

    #[tokio::test]
    async fn credits_get_proxies_upstream_and_post_echoes_cost() {
        let stub = Router::new().route(
            "/api/credits",
            get(|| async { Json(json!({"balance": 12.5, "currency": "USD"})) }),
        );
        let base = spawn_stub(stub).await;
        let state = test_state(test_config(&base), Arc::new(MemoryStore::new()));
        let app = build_router(state);

        let (status, body) = send_get(&app, "/api/credits").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"balance": 12.5, "currency": "USD"}));

        let (status, body) =
            send_json(&app, "POST", "/api/credits", json!({"computeCost": 0.025})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"credits": 0.025}));
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut config = test_config("http://127.0.0.1:9");
        config.max_body_bytes = 1024;
        let app = build_router(test_state(config, store));

        let huge = "x".repeat(4096);
        let (status, _) = send_json(&app, "POST", "/api/generate", json!({"prompt": huge})).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
