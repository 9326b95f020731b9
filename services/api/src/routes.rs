use crate::infra::{cors_layer, with_security_headers, AppState};
use apply_intake::intake::{intake_router, ApplicationRepository, IntakeService};
use apply_intake::middleware::{enforce_rate_limit, RateLimiter};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Full HTTP surface: intake endpoint, operational probes, and static assets, behind the
/// `/api` rate limit and the shared response layers.
pub(crate) fn with_application_routes<R>(
    service: Arc<IntakeService<R>>,
    limiter: RateLimiter,
    state: AppState,
    public_dir: &Path,
) -> Router
where
    R: ApplicationRepository + 'static,
{
    let router = intake_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .fallback_service(ServeDir::new(public_dir))
        .layer(from_fn_with_state(limiter, enforce_rate_limit))
        .layer(Extension(state))
        .layer(cors_layer());

    with_security_headers(router)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use apply_intake::config::RateLimitConfig;
    use apply_intake::intake::{Application, ApplicationId, RepositoryError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{HeaderValue, Request};
    use axum::response::Response;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct StaticIdRepository;

    #[async_trait]
    impl ApplicationRepository for StaticIdRepository {
        async fn insert(
            &self,
            _application: &Application,
        ) -> Result<ApplicationId, RepositoryError> {
            Ok(ApplicationId(7))
        }
    }

    struct Harness {
        app: Router,
        readiness: Arc<AtomicBool>,
        _public: TempDir,
    }

    fn harness(max_requests: usize) -> Harness {
        let public = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            public.path().join("index.html"),
            "<form id=\"apply\"></form>",
        )
        .expect("write index");

        let readiness = Arc::new(AtomicBool::new(false));
        let state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let limiter = RateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests,
        });
        let service = Arc::new(IntakeService::new(Arc::new(StaticIdRepository)));

        Harness {
            app: with_application_routes(service, limiter, state, public.path()),
            readiness,
            _public: public,
        }
    }

    fn get_request(path: &str) -> Request<Body> {
        Request::get(path)
            .extension(ConnectInfo(SocketAddr::from(([192, 0, 2, 50], 5000))))
            .body(Body::empty())
            .expect("request builds")
    }

    async fn body_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        String::from_utf8(body.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn serves_static_index_with_security_headers() {
        let Harness { app, _public, .. } = harness(30);

        let response = app.oneshot(get_request("/")).await.expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(headers["cross-origin-opener-policy"], "same-origin");
        assert_eq!(headers["cross-origin-resource-policy"], "same-origin");
        assert_eq!(headers["origin-agent-cluster"], "?1");
        let policy = headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .expect("ascii policy");
        assert!(policy.starts_with("default-src 'self';base-uri 'self';"));
        assert!(policy.contains(";script-src 'self';script-src-attr 'none';"));
        assert!(policy.ends_with(";upgrade-insecure-requests"));
        assert!(body_text(response).await.contains("id=\"apply\""));
    }

    #[tokio::test]
    async fn missing_assets_return_not_found() {
        let Harness { app, _public, .. } = harness(30);
        let response = app
            .oneshot(get_request("/missing.css"))
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn apply_endpoint_is_mounted() {
        let Harness { app, _public, .. } = harness(30);
        let request = Request::post("/api/apply")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "https://forms.example.org")
            .extension(ConnectInfo(SocketAddr::from(([192, 0, 2, 50], 5000))))
            .body(Body::from(
                json!({
                    "name": "Ann Lee",
                    "email": "ann@x.com",
                    "gender": "female",
                    "age": 30,
                    "current_occupation": "engineer",
                })
                .to_string(),
            ))
            .expect("request builds");

        let response = app.oneshot(request).await.expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            HeaderValue::from_static("https://forms.example.org")
        );
        assert_eq!(body_text(response).await, r#"{"ok":true,"id":7}"#);
    }

    #[tokio::test]
    async fn rate_limit_covers_unknown_api_paths_only() {
        let Harness { app, _public, .. } = harness(1);

        let first = app
            .clone()
            .oneshot(get_request("/api/unknown"))
            .await
            .expect("responds");
        assert_eq!(first.status(), StatusCode::NOT_FOUND);

        let second = app
            .clone()
            .oneshot(get_request("/api/apply"))
            .await
            .expect("responds");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(second.headers()["x-ratelimit-limit"], "1");
        assert_eq!(second.headers()["x-ratelimit-remaining"], "0");
        assert!(second.headers().contains_key("x-ratelimit-reset"));

        for _ in 0..3 {
            let health = app
                .clone()
                .oneshot(get_request("/health"))
                .await
                .expect("responds");
            assert_eq!(health.status(), StatusCode::OK);
            assert!(!health.headers().contains_key("x-ratelimit-limit"));
        }
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        let Harness {
            app,
            readiness,
            _public,
        } = harness(30);

        let before = app
            .clone()
            .oneshot(get_request("/ready"))
            .await
            .expect("responds");
        assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.store(true, Ordering::Release);
        let after = app.oneshot(get_request("/ready")).await.expect("responds");
        assert_eq!(after.status(), StatusCode::OK);
        assert_eq!(body_text(after).await, r#"{"status":"ready"}"#);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_text_exposition() {
        let Harness { app, _public, .. } = harness(30);
        let response = app
            .oneshot(get_request("/metrics"))
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }
}
