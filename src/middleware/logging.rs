//! Per-request log line.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use super::ip::extract_client_ip;
use super::request_id::RequestId;
use crate::state::AppState;

/// Log method, URL and client IP of every request outside the monitoring paths.
pub async fn log_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.is_monitoring_path(request.uri().path()) {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();

        info!(
            method = %request.method(),
            url = %request.uri(),
            client_ip = %extract_client_ip(&request),
            request_id = %request_id,
            "Incoming request"
        );
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::build_router;
    use crate::test_support::{CapturedLogs, FakeUpstream, test_state};

    const RECORD: &str = "Incoming request";

    fn router() -> axum::Router {
        let upstream = Arc::new(FakeUpstream::ok_json(200, json!([])));
        build_router(test_state(Config::default(), upstream)).unwrap()
    }

    #[tokio::test]
    async fn test_one_info_record_per_request() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let router = router();

        let response = router
            .oneshot(
                Request::get("/pets?species=cat")
                    .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = logs.records(RECORD);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "INFO");

        let fields = &records[0]["fields"];
        assert_eq!(fields["method"], "GET");
        assert_eq!(fields["url"], "/pets?species=cat");
        assert_eq!(fields["client_ip"], "203.0.113.7");
        assert_eq!(fields["request_id"], "req-42");
    }

    #[tokio::test]
    async fn test_client_ip_unknown_without_headers_or_peer() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let records = logs.records(RECORD);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["fields"]["client_ip"], "unknown");
    }

    #[tokio::test]
    async fn test_monitoring_paths_are_not_logged() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let router = router();

        for uri in ["/health", "/status", "/ready", "/status/dashboard"] {
            router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }

        assert!(logs.records(RECORD).is_empty());
    }

    #[tokio::test]
    async fn test_csrf_rejections_are_still_logged() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let response = router()
            .oneshot(Request::post("/gifts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let records = logs.records(RECORD);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["fields"]["method"], "POST");
    }
}
