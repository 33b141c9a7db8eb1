use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{LeadId, RawLeadSubmission};
use super::ledger::PartnerStore;
use super::recorder::DecisionRecorder;
use super::repository::{LeadRepository, RepositoryError};
use super::service::{LeadAssignmentService, LeadResponse, LeadServiceError};

/// Router exposing lead intake, status lookup and downstream responses.
pub fn lead_router<L, P, E>(service: Arc<LeadAssignmentService<L, P, E>>) -> Router
where
    L: LeadRepository + 'static,
    P: PartnerStore + 'static,
    E: DecisionRecorder + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(intake_handler::<L, P, E>))
        .route("/api/v1/leads/:lead_id", get(status_handler::<L, P, E>))
        .route(
            "/api/v1/leads/:lead_id/response",
            post(respond_handler::<L, P, E>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseRequest {
    pub response: LeadResponse,
}

pub(crate) async fn intake_handler<L, P, E>(
    State(service): State<Arc<LeadAssignmentService<L, P, E>>>,
    axum::Json(submission): axum::Json<RawLeadSubmission>,
) -> Response
where
    L: LeadRepository + 'static,
    P: PartnerStore + 'static,
    E: DecisionRecorder + 'static,
{
    match service.intake(submission) {
        Ok(record) => {
            let payload = json!({
                "lead": record.status_view(),
                "decision": record.decision,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(LeadServiceError::Rejected(reasons)) => {
            let payload = json!({
                "error": reasons.to_string(),
                "violations": reasons.messages(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(LeadServiceError::Persistence { decision, source }) => {
            let payload = json!({
                "error": source.to_string(),
                "decision": decision,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn status_handler<L, P, E>(
    State(service): State<Arc<LeadAssignmentService<L, P, E>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    L: LeadRepository + 'static,
    P: PartnerStore + 'static,
    E: DecisionRecorder + 'static,
{
    match service.get(&LeadId(lead_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn respond_handler<L, P, E>(
    State(service): State<Arc<LeadAssignmentService<L, P, E>>>,
    Path(lead_id): Path<String>,
    axum::Json(request): axum::Json<ResponseRequest>,
) -> Response
where
    L: LeadRepository + 'static,
    P: PartnerStore + 'static,
    E: DecisionRecorder + 'static,
{
    match service.respond(&LeadId(lead_id), request.response) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(other) => error_response(other),
    }
}

fn error_response(error: LeadServiceError) -> Response {
    let status = match &error {
        LeadServiceError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LeadServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        LeadServiceError::Repository(
            RepositoryError::Conflict
            | RepositoryError::AllocationInProgress
            | RepositoryError::RecentSubmission { .. },
        )
        | LeadServiceError::Lifecycle(_) => StatusCode::CONFLICT,
        LeadServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        LeadServiceError::Repository(RepositoryError::Unavailable(_))
        | LeadServiceError::Store(_)
        | LeadServiceError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
