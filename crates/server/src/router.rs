//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::permissive().allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .route(
            "/api/rotations/trigger",
            get(api::trigger_get).post(api::trigger_post),
        )
        .route("/api/rotations/{id}/signal", post(api::rotation_signal))
        .route("/api/rotations/{id}/on-call", get(api::rotation_on_call))
        .route("/api/workflows", get(api::workflows_list))
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use oncall_core::config::parse_api_keys;
    use oncall_core::{Config, TransitionReason};
    use oncall_notify::{ChangeNotifier, NotifyOutcome};
    use oncall_scheduler::{MemoryCheckpointStore, RetryPolicy, SystemClock, WorkflowDeps, WorkflowEngine};

    use crate::directory::tests::write_sample;
    use crate::directory::FileDirectory;

    struct Silent;

    #[async_trait]
    impl ChangeNotifier for Silent {
        async fn notify_on_change(
            &self,
            _rotation_id: &str,
            _previous: Option<&str>,
            _new: Option<&str>,
            _reason: TransitionReason,
        ) -> NotifyOutcome {
            NotifyOutcome::Unchanged
        }
    }

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        _tmp: tempfile::TempDir,
    }

    fn app() -> TestApp {
        let tmp = tempfile::tempdir().unwrap();
        let directory = Arc::new(FileDirectory::new(write_sample(tmp.path())));

        let mut config = Config::for_profile("ROUTER_TEST");
        config.auth.api_keys = parse_api_keys("k-acme:acme,k-globex:globex");
        config.server.cors_origin = "*".to_string();

        let deps = WorkflowDeps {
            rotations: directory.clone(),
            notifier: Arc::new(Silent),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
        };
        let state = Arc::new(AppState {
            config,
            rotations: directory,
            engine: Arc::new(WorkflowEngine::new(deps, 100)),
        });

        TestApp {
            router: build_router(state.clone()),
            state,
            _tmp: tmp,
        }
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, key: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", format!("Bearer {key}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn strings(value: &serde_json::Value) -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app();
        let (status, body) = call(&app.router, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["workflows_running"], 0);
    }

    #[tokio::test]
    async fn trigger_requires_api_key() {
        let app = app();
        let (status, body) = call(&app.router, get("/api/rotations/trigger?id=rot-primary", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("API key"));

        let (status, _) = call(&app.router, get("/api/rotations/trigger?id=rot-primary", Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn partial_batch_is_still_ok() {
        let app = app();
        let (status, body) = call(
            &app.router,
            get("/api/rotations/trigger?ids=rot-primary,missing1,rot-secondary", Some("k-acme")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requested"], 3);
        assert_eq!(strings(&body["started"]), vec!["rot-primary", "rot-secondary"]);
        assert_eq!(strings(&body["missing"]), vec!["missing1"]);
        assert_eq!(body["failed"].as_array().unwrap().len(), 0);

        assert!(app.state.engine.is_running("rot-primary"));
        assert!(app.state.engine.is_running("rot-secondary"));
    }

    #[tokio::test]
    async fn partial_batch_via_json_body() {
        let app = app();
        let (status, body) = call(
            &app.router,
            post_json(
                "/api/rotations/trigger",
                "k-acme",
                r#"{"id": "rot-primary", "ids": ["missing1", "rot-secondary", "rot-primary"]}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requested"], 3);
        assert_eq!(strings(&body["started"]), vec!["rot-primary", "rot-secondary"]);
        assert_eq!(strings(&body["missing"]), vec!["missing1"]);
        assert_eq!(body["failed"].as_array().unwrap().len(), 0);
        assert!(app.state.engine.is_running("rot-secondary"));
    }

    #[tokio::test]
    async fn other_tenants_rotations_are_missing() {
        let app = app();
        let (status, body) = call(&app.router, get("/api/rotations/trigger?id=rot-other", Some("k-acme"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(strings(&body["missing"]), vec!["rot-other"]);
        assert!(!app.state.engine.is_running("rot-other"));
    }

    #[tokio::test]
    async fn empty_trigger_is_bad_request() {
        let app = app();
        let (status, _) = call(&app.router, post_json("/api/rotations/trigger", "k-acme", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app.router, get("/api/rotations/trigger?ids=,,", Some("k-acme"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn trigger_all_starts_live_tenant_rotations() {
        let app = app();
        let (status, body) = call(
            &app.router,
            post_json("/api/rotations/trigger", "k-acme", r#"{"all": true}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(strings(&body["started"]), vec!["rot-primary", "rot-secondary"]);
        assert!(!app.state.engine.is_running("rot-retired"));
    }

    #[tokio::test]
    async fn repeated_trigger_attaches_to_running_workflow() {
        let app = app();
        for _ in 0..2 {
            let (status, body) = call(
                &app.router,
                post_json("/api/rotations/trigger", "k-acme", r#"{"ids": ["rot-primary"]}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(strings(&body["started"]), vec!["rot-primary"]);
        }
        assert_eq!(app.state.engine.running().len(), 1);
    }

    #[tokio::test]
    async fn on_call_reports_override() {
        let app = app();
        let (status, body) = call(
            &app.router,
            get("/api/rotations/rot-primary/on-call?at=2024-01-10T12:00:00Z", Some("k-acme")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assignee"], "dave");
        assert_eq!(body["base_assignee"], "bob");
        assert_eq!(body["override_id"], "ov-1");
        assert_eq!(body["next_transition"]["reason"], "override_end");
    }

    #[tokio::test]
    async fn on_call_hides_other_tenants() {
        let app = app();
        let (status, _) = call(&app.router, get("/api/rotations/rot-primary/on-call", Some("k-globex"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn signal_needs_a_running_workflow() {
        let app = app();
        let signal = || post_json("/api/rotations/rot-primary/signal", "k-acme", "");

        let (status, _) = call(&app.router, signal()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(&app.router, get("/api/rotations/trigger?id=rot-primary", Some("k-acme"))).await;
        let (status, body) = call(&app.router, signal()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signaled"], true);
    }

    #[tokio::test]
    async fn workflows_are_listed_per_tenant() {
        let app = app();
        call(&app.router, get("/api/rotations/trigger?all=true", Some("k-acme"))).await;
        call(&app.router, get("/api/rotations/trigger?all=true", Some("k-globex"))).await;

        let (status, body) = call(&app.router, get("/api/workflows", Some("k-acme"))).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["rotation_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["rot-primary", "rot-secondary"]);

        let (_, body) = call(&app.router, get("/api/workflows", Some("k-globex"))).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn docs_are_served() {
        let app = app();
        let response = app.router.clone().oneshot(get("/docs", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
