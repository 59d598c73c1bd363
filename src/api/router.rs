//! API router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//!
//! Middleware stack on caller-scoped routes (outermost → innermost):
//! 1. Body limit → 2. Caller identity → 3. Access log
//!
//! `/api/health` needs no caller.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Room for multipart boundaries and part headers on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn api_router(core: Arc<CoreState>) -> Router {
    let body_limit = core.config().max_upload_bytes + MULTIPART_OVERHEAD;
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let scoped = Router::new()
        .route(
            "/reports",
            get(endpoints::reports::list).post(endpoints::reports::upload),
        )
        .route(
            "/reports/:id",
            get(endpoints::reports::detail).delete(endpoints::reports::remove),
        )
        .route("/reports/:id/biomarkers", get(endpoints::reports::biomarkers))
        .route("/reports/:id/insights", get(endpoints::insights::for_report))
        .route("/insights/summary", get(endpoints::insights::summary))
        .route("/biomarkers/trend", get(endpoints::insights::trend))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::caller::require_caller))
        .layer(DefaultBodyLimit::max(body_limit));

    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new().nest("/api", scoped.merge(open))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::api::types::{OWNER_HEADER, TENANT_HEADER};
    use crate::core_state::tests::{start_test_core, wait_until_terminal};
    use crate::models::Caller;

    const BOUNDARY: &str = "labinsight-test-boundary";

    fn caller() -> Caller {
        Caller::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn make_request(method: &str, uri: &str, caller: Option<&Caller>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(c) = caller {
            builder = builder
                .header(OWNER_HEADER, c.owner_id.to_string())
                .header(TENANT_HEADER, c.tenant_id.to_string());
        }
        builder.body(Body::empty()).unwrap()
    }

    fn upload_request(caller: &Caller, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/reports")
            .header(OWNER_HEADER, caller.owner_id.to_string())
            .header(TENANT_HEADER, caller.tenant_id.to_string())
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_caller() {
        let (started, _dir) = start_test_core().await;
        let app = api_router(started.core.clone());

        let response = app.oneshot(make_request("GET", "/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["accepting_jobs"], true);
        started.pool.shutdown().await;
    }

    #[tokio::test]
    async fn scoped_routes_require_caller_headers() {
        let (started, _dir) = start_test_core().await;
        let app = api_router(started.core.clone());

        let response = app.oneshot(make_request("GET", "/api/reports", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "CALLER_REQUIRED");
        started.pool.shutdown().await;
    }

    #[tokio::test]
    async fn upload_process_read_and_delete() {
        let (started, _dir) = start_test_core().await;
        let core = started.core.clone();
        let me = caller();

        let text = b"Collection Date: 2024-05-01\nGlucose 130 mg/dL 70-100\nHIV: Negative";
        let response = api_router(core.clone())
            .oneshot(upload_request(&me, "file", "panel.txt", text))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let created = body_json(response).await;
        assert_eq!(created["processing_status"], "pending");
        assert_eq!(created["mime_type"], "text/plain");
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        wait_until_terminal(&core, id).await;

        let response = api_router(core.clone())
            .oneshot(make_request("GET", &format!("/api/reports/{id}"), Some(&me)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["processing_status"], "completed");

        let response = api_router(core.clone())
            .oneshot(make_request("GET", &format!("/api/reports/{id}/biomarkers"), Some(&me)))
            .await
            .unwrap();
        let biomarkers = body_json(response).await;
        assert_eq!(biomarkers.as_array().unwrap().len(), 2);
        assert_eq!(biomarkers[0]["test_date"], "2024-05-01");

        let response = api_router(core.clone())
            .oneshot(make_request("GET", &format!("/api/reports/{id}/insights"), Some(&me)))
            .await
            .unwrap();
        let insights = body_json(response).await;
        assert_eq!(insights[0]["status"], "high");
        assert_eq!(insights[1]["status"], "normal");

        let response = api_router(core.clone())
            .oneshot(make_request("GET", "/api/insights/summary", Some(&me)))
            .await
            .unwrap();
        let summary = body_json(response).await;
        assert_eq!(summary["total"], 2);
        assert_eq!(summary["abnormal_count"], 1);

        let response = api_router(core.clone())
            .oneshot(make_request(
                "GET",
                "/api/biomarkers/trend?test_name=glucose&from=2024-01-01",
                Some(&me),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let trend = body_json(response).await;
        assert_eq!(trend["points"][0]["value"], "130");
        assert_eq!(trend["points"][0]["date"], "2024-05-01");

        let response = api_router(core.clone())
            .oneshot(make_request("GET", "/api/reports", Some(&me)))
            .await
            .unwrap();
        let list = body_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert!(list[0].get("raw_extracted_text").is_none());

        let response = api_router(core.clone())
            .oneshot(make_request("DELETE", &format!("/api/reports/{id}"), Some(&me)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = api_router(core.clone())
            .oneshot(make_request("GET", &format!("/api/reports/{id}"), Some(&me)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        started.pool.shutdown().await;
    }

    #[tokio::test]
    async fn other_tenant_gets_404_and_bad_id_gets_400() {
        let (started, _dir) = start_test_core().await;
        let core = started.core.clone();
        let owner = caller();

        let response = api_router(core.clone())
            .oneshot(upload_request(&owner, "file", "lipids.txt", b"LDL: 130 mg/dL"))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let intruder = Caller::new(owner.owner_id, Uuid::new_v4());
        let response = api_router(core.clone())
            .oneshot(make_request("GET", &format!("/api/reports/{id}"), Some(&intruder)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = api_router(core.clone())
            .oneshot(make_request("GET", "/api/reports/not-a-uuid", Some(&owner)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        started.pool.shutdown().await;
    }

    #[tokio::test]
    async fn upload_rejections() {
        let (started, _dir) = start_test_core().await;
        let core = started.core.clone();
        let me = caller();

        let response = api_router(core.clone())
            .oneshot(upload_request(&me, "attachment", "panel.txt", b"LDL: 130 mg/dL"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = api_router(core.clone())
            .oneshot(upload_request(&me, "file", "panel.docx", b"LDL: 130 mg/dL"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");

        let response = api_router(core.clone())
            .oneshot(upload_request(&me, "file", "empty.txt", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        started.pool.shutdown().await;
    }

    #[tokio::test]
    async fn trend_validation_maps_to_400() {
        let (started, _dir) = start_test_core().await;
        let me = caller();

        let response = api_router(started.core.clone())
            .oneshot(make_request("GET", "/api/biomarkers/trend?from=2024-01-01", Some(&me)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = api_router(started.core.clone())
            .oneshot(make_request(
                "GET",
                "/api/biomarkers/trend?test_name=LDL&to=June",
                Some(&me),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        started.pool.shutdown().await;
    }
}
