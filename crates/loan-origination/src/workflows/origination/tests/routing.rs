use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::OriginationConfig;
use crate::workflows::origination::memory::InMemoryNotificationPublisher;
use crate::workflows::origination::repository::ApplicationRepository;
use crate::workflows::origination::router::{
    application_router, review_handler, status_handler, ReviewBody,
};
use crate::workflows::origination::service::LoanApplicationService;
use crate::workflows::origination::status::ApplicationStatus;

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn create_route_returns_the_new_draft() {
    let (service, _, _, _) = build_service();
    let router = application_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/applications",
            json!({
                "applicantId": APPLICANT,
                "applicantEmail": APPLICANT_EMAIL,
                "productId": "personal-fixed",
                "amount": 12000,
                "termMonths": 36,
                "purpose": "Vehicle",
            }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "draft");
    assert_eq!(body["applicationNumber"], "APP-2025-001");
    assert_eq!(body["terms"]["amount"], 12000);
    assert_eq!(body["version"], 0);
}

#[tokio::test]
async fn review_route_reports_success_and_detail_lists_newest_first() {
    let (service, _, _, _) = build_service();
    let application = application_at(&service, ApplicationStatus::DecisionPending);
    let router = application_router(Arc::new(service));
    let uri = format!("/api/v1/applications/{}/review", application.id);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &uri,
            json!({
                "decision": "approved",
                "notes": "Meets all lending criteria",
                "reviewerId": STAFF,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], true);

    let response = router
        .oneshot(get_request(&format!(
            "/api/v1/applications/{}",
            application.id
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["reviews"][0]["decision"], "approved");
    assert_eq!(body["activities"][0]["action"], "decision_approved");
}

#[tokio::test]
async fn review_handler_rejects_missing_decision_with_field() {
    let (service, _, _, _) = build_service();
    let application = application_at(&service, ApplicationStatus::DecisionPending);

    let response = review_handler(
        State(Arc::new(service)),
        Path(application.id.0.clone()),
        axum::Json(ReviewBody {
            reviewer_id: staff().id,
            decision: None,
            notes: Some("Looks fine".to_string()),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["field"], "decision");
}

#[tokio::test]
async fn review_handler_maps_store_failure_to_internal_error() {
    let inner = crate::workflows::origination::memory::InMemoryApplicationRepository::with_actors(
        actors(),
    );
    let seeding = LoanApplicationService::new(
        Arc::new(inner.clone()),
        Arc::new(profiles()),
        Arc::new(InMemoryNotificationPublisher::default()),
        OriginationConfig::default(),
    );
    let application = seeding.start(new_application()).expect("start");
    seeding
        .submit(&application.id, &applicant().id)
        .expect("submit");

    let failing = LoanApplicationService::new(
        Arc::new(FailingCommitRepository {
            inner: inner.clone(),
        }),
        Arc::new(profiles()),
        Arc::new(InMemoryNotificationPublisher::default()),
        OriginationConfig::default(),
    );
    let response = review_handler(
        State(Arc::new(failing)),
        Path(application.id.0.clone()),
        axum::Json(ReviewBody {
            reviewer_id: staff().id,
            decision: Some("denied".to_string()),
            notes: Some("Incomplete".to_string()),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let record = inner
        .fetch(&application.id)
        .expect("fetch")
        .expect("record present");
    assert_eq!(record.application.status, ApplicationStatus::Screening);
    assert!(record.reviews.is_empty());
}

#[tokio::test]
async fn patch_distinguishes_unreachable_from_forbidden() {
    let (service, _, _, _) = build_service();
    let application = application_at(&service, ApplicationStatus::Underwriting);
    let router = application_router(Arc::new(service));
    let uri = format!("/api/v1/applications/{}", application.id);

    let unreachable = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            json!({ "userId": STAFF, "status": "APPROVED" }),
        ))
        .await
        .expect("response");
    assert_eq!(unreachable.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json_body(unreachable).await["kind"], "invalid_transition");

    let forbidden = router
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            json!({ "userId": STAFF, "status": "DECISION_PENDING" }),
        ))
        .await
        .expect("response");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let body = read_json_body(forbidden).await;
    assert_eq!(body["kind"], "forbidden");
    assert!(!body["error"].as_str().unwrap_or_default().contains("admin"));
}

#[tokio::test]
async fn patch_rejects_unknown_status_and_unknown_fields() {
    let (service, _, _, _) = build_service();
    let application = service.start(new_application()).expect("start");
    let router = application_router(Arc::new(service));
    let uri = format!("/api/v1/applications/{}", application.id);

    let bad_status = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            json!({ "userId": ADMIN, "status": "ON_HOLD" }),
        ))
        .await
        .expect("response");
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(bad_status).await["field"], "status");

    let bad_field = router
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            json!({ "userId": APPLICANT, "changedFields": [] }),
        ))
        .await
        .expect("response");
    assert_eq!(bad_field.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(bad_field).await["field"], "changedFields");
}

#[tokio::test]
async fn patch_saves_fields_and_reports_changes() {
    let (service, _, _, _) = build_service();
    let application = service.start(new_application()).expect("start");
    let router = application_router(Arc::new(service));
    let uri = format!("/api/v1/applications/{}", application.id);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            json!({
                "userId": APPLICANT,
                "annualIncome": "95000",
                "currentStep": 3,
                "version": 0,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["changedFields"], json!(["annualIncome"]));
    assert_eq!(body["currentStep"], 3);
    assert_eq!(body["version"], 1);

    let stale = router
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            json!({ "userId": APPLICANT, "phone": "555-0100", "version": 0 }),
        ))
        .await
        .expect("response");
    assert_eq!(stale.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_and_list_routes() {
    let (service, _, _, _) = build_service();
    let application = service.start(new_application()).expect("start");
    let router = application_router(Arc::new(service));

    let submitted = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/applications/{}/submit", application.id),
            json!({ "userId": APPLICANT }),
        ))
        .await
        .expect("response");
    assert_eq!(submitted.status(), StatusCode::OK);
    let body = read_json_body(submitted).await;
    assert_eq!(body["status"], "SCREENING");
    assert!(body["submittedAt"].is_string());

    let listed = router
        .clone()
        .oneshot(get_request(&format!(
            "/api/v1/applications?applicantId={APPLICANT}"
        )))
        .await
        .expect("response");
    assert_eq!(listed.status(), StatusCode::OK);
    let body = read_json_body(listed).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["progress"], 10);

    let listed = router
        .clone()
        .oneshot(get_request(&format!("/api/v1/applications?userId={APPLICANT}")))
        .await
        .expect("response");
    assert_eq!(listed.status(), StatusCode::OK);
    let body = read_json_body(listed).await;
    assert_eq!(body[0]["id"], application.id.0.as_str());

    let missing = router
        .oneshot(get_request("/api/v1/applications"))
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_application_is_not_found() {
    let (service, _, _, _) = build_service();
    let router = application_router(Arc::new(service));

    let response = router
        .oneshot(get_request("/api/v1/applications/loan-missing"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json_body(response).await["kind"], "not_found");
}

#[tokio::test]
async fn status_metadata_lists_destinations_and_reasons() {
    let response = status_handler(Path("SCREENING".to_string())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json_body(response).await;
    assert_eq!(body["label"], "Screening");
    let destinations: Vec<&str> = body["transitions"]
        .as_array()
        .expect("transitions array")
        .iter()
        .filter_map(|transition| transition["to"].as_str())
        .collect();
    assert_eq!(destinations, vec!["UNDERWRITING", "REJECTED", "TO_LOS"]);
    assert_eq!(body["steps"][0]["state"], "current");

    let response = status_handler(Path("DECISION_PENDING".to_string())).await;
    let body = read_json_body(response).await;
    let stages: Vec<(&str, &str)> = body["stages"]
        .as_array()
        .expect("stages array")
        .iter()
        .filter_map(|stage| Some((stage["stage"].as_str()?, stage["state"].as_str()?)))
        .take(4)
        .collect();
    assert_eq!(
        stages,
        vec![
            ("SCREENING", "completed"),
            ("UNDERWRITING", "completed"),
            ("DECISION", "current"),
            ("DOCUMENTS", "pending"),
        ]
    );

    let response = status_handler(Path("REJECTED".to_string())).await;
    let body = read_json_body(response).await;
    assert!(body["stages"]
        .as_array()
        .expect("stages array")
        .iter()
        .all(|stage| stage["state"] == "pending"));

    let unknown = status_handler(Path("ON_HOLD".to_string())).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pipeline_route_lists_everything() {
    let (service, _, _, _) = build_service();
    service.start(new_application()).expect("start");
    let router = application_router(Arc::new(service));

    let response = router
        .oneshot(get_request("/api/v1/pipeline"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body[0]["timeInStatus"], "0h");
    assert_eq!(body[0]["status"], "draft");
}
