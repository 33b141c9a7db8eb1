use crate::infra::AppState;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use restoration_leads::allocation::{
    lead_router, DecisionRecorder, LeadAssignmentService, LeadRepository, PartnerStore,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn with_lead_routes<L, P, E>(
    service: Arc<LeadAssignmentService<L, P, E>>,
) -> axum::Router
where
    L: LeadRepository + 'static,
    P: PartnerStore + 'static,
    E: DecisionRecorder + 'static,
{
    lead_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{load_partners, sample_submissions, InMemoryEventLog, InMemoryLeadRepository};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use restoration_leads::allocation::{EngineConfig, InMemoryPartnerStore};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let partners = load_partners(None).expect("sample roster parses");
        let service = LeadAssignmentService::new(
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(InMemoryPartnerStore::new(partners)),
            Arc::new(InMemoryEventLog::default()),
            EngineConfig::default(),
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
        };
        with_lead_routes(Arc::new(service)).layer(Extension(state))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("body is json")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_flag() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "initializing");

        let response = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lead_routes_are_mounted() {
        let submission = sample_submissions().remove(0);
        let request = Request::post("/api/v1/leads")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&submission).unwrap()))
            .unwrap();

        let response = app(true).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["lead"]["status"], "assigned");
        assert_eq!(body["decision"]["partner_id"], "harbour-dry");
    }
}
