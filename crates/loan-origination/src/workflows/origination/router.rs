use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use super::decision::Decision;
use super::domain::{ApplicationId, UserId};
use super::engine::{TransitionRequest, WorkflowError};
use super::reconciliation::{FieldEdits, ProfileSource};
use super::repository::{ApplicationRepository, NotificationPublisher};
use super::service::{
    ApplicationServiceError, DocumentUpload, ErrorKind, LoanApplicationService, NewApplication,
    SaveRequest, StatusChangeRequest,
};
use super::status::{
    pipeline_steps, stage_state, ApplicationStatus, PipelineStage, PipelineStep, StepState,
};
use super::transitions::{allowed_destinations, suggested_reasons};

type SharedService<R, P, N> = Arc<LoanApplicationService<R, P, N>>;

/// Router builder exposing the application lifecycle endpoints.
pub fn application_router<R, P, N>(service: SharedService<R, P, N>) -> Router
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_handler::<R, P, N>).get(list_handler::<R, P, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(detail_handler::<R, P, N>).patch(update_handler::<R, P, N>),
        )
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler::<R, P, N>),
        )
        .route(
            "/api/v1/applications/:application_id/review",
            post(review_handler::<R, P, N>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            post(document_handler::<R, P, N>),
        )
        .route("/api/v1/pipeline", get(pipeline_handler::<R, P, N>))
        .route("/api/v1/statuses/:status", get(status_handler))
        .with_state(service)
}

/// PATCH body: an explicit transition when `status` is present, a plain save otherwise.
/// Every key not listed here is treated as an applicant field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateBody {
    pub user_id: UserId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub status_notes: Option<String>,
    #[serde(default)]
    pub los_reference_number: Option<String>,
    #[serde(default)]
    pub los_routing_reason: Option<String>,
    #[serde(default)]
    pub current_step: Option<u8>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitBody {
    pub user_id: UserId,
}

/// Decision and notes stay strings so a missing or malformed value is a field-level error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewBody {
    pub reviewer_id: UserId,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    #[serde(default, alias = "userId")]
    pub applicant_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    status: ApplicationStatus,
    label: &'static str,
    description: &'static str,
    badge: &'static str,
    terminal: bool,
    progress: u8,
    estimated_completion: &'static str,
    next_steps: &'static [&'static str],
    steps: Vec<PipelineStep>,
    stages: Vec<StageView>,
    transitions: Vec<TransitionView>,
}

#[derive(Debug, Serialize)]
struct StageView {
    stage: PipelineStage,
    label: &'static str,
    state: StepState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransitionView {
    to: ApplicationStatus,
    label: &'static str,
    suggested_reasons: &'static [&'static str],
}

pub(crate) async fn create_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    axum::Json(request): axum::Json<NewApplication>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    match service.start(request) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    let Some(applicant_id) = query
        .applicant_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return error_response(WorkflowError::validation("applicantId", "is required").into());
    };

    match service.list_for_applicant(&UserId(applicant_id)) {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<UpdateBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    let id = ApplicationId(application_id);
    let edits = match FieldEdits::from_payload(&body.fields) {
        Ok(edits) => edits,
        Err(error) => return error_response(WorkflowError::from(error).into()),
    };

    let result = match body.status {
        Some(raw) => {
            let to = match raw.parse::<ApplicationStatus>() {
                Ok(status) => status,
                Err(error) => {
                    return error_response(
                        WorkflowError::validation("status", error.to_string()).into(),
                    )
                }
            };
            let mut transition = TransitionRequest::to(to);
            transition.reason = body.status_reason;
            transition.notes = body.status_notes;
            transition.los_reference_number = body.los_reference_number;
            transition.los_routing_reason = body.los_routing_reason;

            service.change_status(
                &id,
                StatusChangeRequest {
                    user_id: body.user_id,
                    transition,
                    edits,
                    expected_version: body.version,
                },
            )
        }
        None => service.save(
            &id,
            SaveRequest {
                user_id: body.user_id,
                edits,
                current_step: body.current_step,
                expected_version: body.version,
            },
        ),
    };

    match result {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<SubmitBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    match service.submit(&ApplicationId(application_id), &body.user_id) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<ReviewBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    let decision = match body.decision.as_deref().map(str::parse::<Decision>) {
        Some(Ok(decision)) => decision,
        Some(Err(error)) => {
            return error_response(
                WorkflowError::validation("decision", error.to_string()).into(),
            )
        }
        None => {
            return error_response(WorkflowError::validation("decision", "is required").into())
        }
    };
    let notes = body.notes.unwrap_or_default();

    match service.record_decision(
        &ApplicationId(application_id),
        &body.reviewer_id,
        decision,
        &notes,
    ) {
        Ok(review) => {
            let payload = json!({
                "success": true,
                "review": review,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn document_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
    Path(application_id): Path<String>,
    axum::Json(upload): axum::Json<DocumentUpload>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    match service.record_document(&ApplicationId(application_id), upload) {
        Ok(activity) => (StatusCode::CREATED, axum::Json(activity)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pipeline_handler<R, P, N>(
    State(service): State<SharedService<R, P, N>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    match service.pipeline() {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler(Path(raw): Path<String>) -> Response {
    let status = match raw.parse::<ApplicationStatus>() {
        Ok(status) => status,
        Err(error) => {
            let payload = json!({
                "error": error.to_string(),
                "kind": ErrorKind::NotFound.as_str(),
            });
            return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
        }
    };

    let transitions = allowed_destinations(status)
        .iter()
        .map(|to| TransitionView {
            to: *to,
            label: to.label(),
            suggested_reasons: suggested_reasons(status, *to),
        })
        .collect();

    let view = StatusView {
        status,
        label: status.label(),
        description: status.description(),
        badge: status.badge().css_classes(),
        terminal: status.is_terminal(),
        progress: status.progress_percentage(),
        estimated_completion: status.estimated_completion(),
        next_steps: status.next_steps(),
        steps: pipeline_steps(status),
        stages: PipelineStage::ordered()
            .into_iter()
            .map(|stage| StageView {
                stage,
                label: stage.label(),
                state: stage_state(stage, status),
            })
            .collect(),
        transitions,
    };
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
    }
}

pub(crate) fn error_response(error: ApplicationServiceError) -> Response {
    let kind = error.kind();
    if kind == ErrorKind::Persistence {
        error!(%error, "application store failure");
    }

    let mut payload = json!({
        "error": error.to_string(),
        "kind": kind.as_str(),
    });
    if let Some(field) = error.field() {
        payload["field"] = Value::String(field.to_string());
    }
    (status_code(kind), axum::Json(payload)).into_response()
}
