//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use cook_coach::ApiServerBuilder;
use cook_coach::voice::SessionConfig;
use tower::ServiceExt;

mod common;
use common::{FakeCamera, FakeConnector, FakeVision, test_catalog};

/// Build a test API router
fn build_test_router(voice: bool) -> axum::Router {
    let mut builder = ApiServerBuilder::new(test_catalog(), 0)
        .camera_device(FakeCamera::working())
        .vision(FakeVision::answering("Looking good.", true));
    if voice {
        builder = builder.voice(SessionConfig::new("agent_test"), FakeConnector::new());
    }
    builder.build().router()
}

async fn call(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    call_with_body(app, method, uri, Body::empty()).await
}

async fn call_with_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Body,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["checks"]["recipes"]["status"], "ok");
    assert_eq!(json["checks"]["camera"]["status"], "ok");
    assert_eq!(json["checks"]["voice"]["status"], "unavailable");
}

#[tokio::test]
async fn test_selection_lists_recipes() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/").await;

    assert_eq!(status, StatusCode::OK);
    let recipes = json["recipes"].as_array().unwrap();
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0]["id"], "test-salad");
    assert_eq!(recipes[0]["step_count"], 3);
}

#[tokio::test]
async fn test_preview_meta_line() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/recipes/test-salad").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"], "3 steps • Crunchy and quick");
    assert_eq!(json["steps"][1]["number"], 2);
    assert_eq!(json["start"], "/cook/test-salad");
}

#[tokio::test]
async fn test_preview_unknown_recipe_is_404() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/recipes/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_cook_view_without_voice() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/cook/test-salad").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Test Salad");
    assert_eq!(json["step"]["label"], "Step 1");
    assert_eq!(json["step"]["can_prev"], false);
    assert_eq!(json["step"]["can_next"], true);
    assert_eq!(json["camera"]["status"], "on");
    assert_eq!(json["camera"]["badge"], "AI Coach");
    assert!(json.get("talk").is_none());
    assert!(json.get("steps").is_none());
    assert!(json.get("debug").is_none());
}

#[tokio::test]
async fn test_unknown_cook_recipe_falls_back_to_first() {
    let app = build_test_router(false);
    let (status, json) = call(&app, "GET", "/cook/missing").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["recipe_id"], "test-salad");
}

#[tokio::test]
async fn test_cook_view_panels() {
    let app = build_test_router(true);
    let (_, json) = call(&app, "GET", "/cook/test-salad?steps=true&debug=true").await;

    assert_eq!(json["talk"]["state"], "disconnected");
    assert_eq!(json["talk"]["label"], "Talk");
    assert_eq!(json["talk"]["disabled"], false);
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["steps"][0]["current"], true);
    assert_eq!(json["steps"][1]["prompt"], "Slice thin rounds");
    assert_eq!(json["debug"]["empty"], "Waiting for tool calls...");
}

#[tokio::test]
async fn test_step_navigation_clamps() {
    let app = build_test_router(false);
    call(&app, "GET", "/cook/test-salad").await;

    let (_, json) = call(&app, "POST", "/api/cook/steps/prev").await;
    assert_eq!(json["step"]["number"], 1);

    let (_, json) = call(&app, "POST", "/api/cook/steps/next").await;
    assert_eq!(json["step"]["number"], 2);
    assert_eq!(json["step"]["prompt"], "Slice thin rounds");

    let (status, json) = call_with_body(
        &app,
        "POST",
        "/api/cook/steps/jump",
        Body::from(r#"{"index": 99}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["step"]["number"], 3);
    assert_eq!(json["step"]["can_next"], false);
}

#[tokio::test]
async fn test_actions_without_session_conflict() {
    let app = build_test_router(false);

    let (status, json) = call(&app, "POST", "/api/cook/steps/next").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "no_session");
}

#[tokio::test]
async fn test_leaving_to_selection_closes_session() {
    let app = build_test_router(false);
    call(&app, "GET", "/cook/test-salad").await;
    call(&app, "GET", "/").await;

    let (status, _) = call(&app, "GET", "/api/cook").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_camera_stop_and_start() {
    let app = build_test_router(false);
    call(&app, "GET", "/cook/test-salad").await;

    let (_, json) = call(&app, "POST", "/api/cook/camera/stop").await;
    assert_eq!(json["status"], "idle");

    let (_, json) = call(&app, "POST", "/api/cook/camera/start").await;
    assert_eq!(json["status"], "on");
}

#[tokio::test]
async fn test_voice_toggle_requires_agent() {
    let app = build_test_router(false);
    call(&app, "GET", "/cook/test-salad").await;

    let (status, json) = call(&app, "POST", "/api/cook/voice/toggle").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "voice_unavailable");
}

#[tokio::test]
async fn test_voice_toggle_connects() {
    let app = build_test_router(true);
    call(&app, "GET", "/cook/test-salad").await;

    let (status, json) = call(&app, "POST", "/api/cook/voice/toggle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "connected");
    assert_eq!(json["mode"], "listening");
    assert_eq!(json["label"], "Listening…");

    let (_, json) = call(&app, "POST", "/api/cook/voice/toggle").await;
    assert_eq!(json["state"], "disconnected");
}

#[tokio::test]
async fn test_debug_log_clear() {
    let app = build_test_router(false);
    call(&app, "GET", "/cook/test-salad").await;

    let (status, json) = call(&app, "GET", "/api/cook/debug").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["entries"].as_array().unwrap().is_empty());

    let (status, _) = call(&app, "DELETE", "/api/cook/debug").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unknown_route_redirects_home() {
    let app = build_test_router(false);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/does/not/exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/");
}

#[tokio::test]
async fn test_question_shows_in_debug_panel() {
    let server = ApiServerBuilder::new(test_catalog(), 0)
        .camera_device(FakeCamera::working())
        .vision(FakeVision::answering("Great color!", true))
        .build();
    let state = server.state();
    let app = server.router();

    call(&app, "GET", "/cook/test-salad").await;
    let session = state.active_session().await.unwrap();
    let reply = session.ask_question(Some("Is it browned?")).await.unwrap();
    assert_eq!(reply, "Great color!");

    let (_, json) = call(&app, "GET", "/api/cook?debug=true").await;
    assert_eq!(json["step"]["number"], 2);
    let entries = json["debug"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["kind"], "tool-call");
    assert_eq!(json["debug"]["scroll_to"], entries[3]["id"]);
}
