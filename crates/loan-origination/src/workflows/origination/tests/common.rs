use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::OriginationConfig;
use crate::workflows::origination::audit::Activity;
use crate::workflows::origination::authorization::Role;
use crate::workflows::origination::domain::{
    Actor, Application, ApplicationId, ApplicationNumber, Clock, LoanTerms, NumberSeries, UserId,
};
use crate::workflows::origination::memory::{
    InMemoryApplicationRepository, InMemoryNotificationPublisher, StaticProfileSource,
};
use crate::workflows::origination::reconciliation::{
    ApplicantField, ExternalProfile, FieldValues, ProfileSnapshot,
};
use crate::workflows::origination::repository::{
    ApplicantNotification, ApplicationFilter, ApplicationRecord, ApplicationRepository, ChangeSet,
    NotificationError, NotificationPublisher, RepositoryError,
};
use crate::workflows::origination::service::{LoanApplicationService, NewApplication};
use crate::workflows::origination::status::ApplicationStatus;

pub(super) const APPLICANT: &str = "user-applicant";
pub(super) const OTHER_APPLICANT: &str = "user-other";
pub(super) const STAFF: &str = "user-staff";
pub(super) const ADMIN: &str = "user-admin";
pub(super) const APPLICANT_EMAIL: &str = "jordan@example.com";

pub(super) type TestService =
    LoanApplicationService<InMemoryApplicationRepository, StaticProfileSource, InMemoryNotificationPublisher>;

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Clock that only moves when a test advances it.
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn applicant() -> Actor {
    Actor::new(APPLICANT, Role::Member)
}

pub(super) fn other_applicant() -> Actor {
    Actor::new(OTHER_APPLICANT, Role::Member)
}

pub(super) fn staff() -> Actor {
    Actor::new(STAFF, Role::Staff)
}

pub(super) fn admin() -> Actor {
    Actor::new(ADMIN, Role::Admin)
}

pub(super) fn actors() -> Vec<Actor> {
    vec![applicant(), other_applicant(), staff(), admin()]
}

pub(super) fn terms() -> LoanTerms {
    LoanTerms {
        product_id: "personal-fixed".to_string(),
        amount: 25_000,
        term_months: 60,
        purpose: "Debt consolidation".to_string(),
        monthly_payment: Some(483.32),
    }
}

pub(super) fn profile_values() -> FieldValues {
    let mut values = FieldValues::new();
    values.insert(ApplicantField::FirstName, "Jordan".to_string());
    values.insert(ApplicantField::LastName, "Reyes".to_string());
    values.insert(ApplicantField::Email, APPLICANT_EMAIL.to_string());
    values.insert(ApplicantField::AnnualIncome, "75000".to_string());
    values.insert(ApplicantField::EmployerName, "Northwind Freight".to_string());
    values
}

pub(super) fn snapshot() -> ProfileSnapshot {
    ProfileSnapshot::capture(profile_values(), fixed_now())
}

/// Standalone application for exercising the pure engine functions.
pub(super) fn application_in(status: ApplicationStatus) -> Application {
    let created = fixed_now() - Duration::days(2);
    Application {
        id: ApplicationId("loan-fixture".to_string()),
        application_number: ApplicationNumber("APP-2025-001".to_string()),
        applicant_id: UserId(APPLICANT.to_string()),
        applicant_email: APPLICANT_EMAIL.to_string(),
        terms: terms(),
        status,
        status_changed_at: created,
        current_step: 1,
        fields: profile_values(),
        profile_snapshot: Some(snapshot()),
        changed_fields: BTreeSet::new(),
        los_reference_number: None,
        los_routing_reason: None,
        submitted_at: None,
        created_at: created,
        updated_at: created,
        version: 3,
    }
}

pub(super) fn new_application() -> NewApplication {
    NewApplication {
        applicant_id: UserId(APPLICANT.to_string()),
        applicant_email: APPLICANT_EMAIL.to_string(),
        terms: terms(),
    }
}

pub(super) fn profiles() -> StaticProfileSource {
    StaticProfileSource::new([(
        APPLICANT_EMAIL.to_string(),
        ExternalProfile {
            values: profile_values(),
        },
    )])
}

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryApplicationRepository>,
    Arc<InMemoryNotificationPublisher>,
    Arc<FixedClock>,
) {
    let repository = Arc::new(InMemoryApplicationRepository::with_actors(actors()));
    let notifications = Arc::new(InMemoryNotificationPublisher::default());
    let clock = Arc::new(FixedClock::new(fixed_now()));
    let service = LoanApplicationService::new(
        repository.clone(),
        Arc::new(profiles()),
        notifications.clone(),
        OriginationConfig::default(),
    )
    .with_clock(clock.clone());
    (service, repository, notifications, clock)
}

/// Start an application and move it into `status` through the service's own operations.
pub(super) fn application_at(service: &TestService, status: ApplicationStatus) -> Application {
    use crate::workflows::origination::engine::TransitionRequest;
    use crate::workflows::origination::reconciliation::FieldEdits;
    use crate::workflows::origination::service::StatusChangeRequest;

    let started = service.start(new_application()).expect("start application");
    if status == ApplicationStatus::Draft {
        return started;
    }

    let mut current = service
        .submit(&started.id, &UserId(APPLICANT.to_string()))
        .expect("submit application");
    let path = [
        ApplicationStatus::Underwriting,
        ApplicationStatus::DecisionPending,
        ApplicationStatus::Approved,
        ApplicationStatus::DocumentPreparation,
    ];
    for next in path {
        if current.status == status {
            break;
        }
        current = service
            .change_status(
                &started.id,
                StatusChangeRequest {
                    user_id: UserId(ADMIN.to_string()),
                    transition: TransitionRequest::to(next),
                    edits: FieldEdits::default(),
                    expected_version: None,
                },
            )
            .expect("advance application");
    }
    assert_eq!(current.status, status, "fixture path does not reach {status}");
    current
}

/// Store whose commit always fails after reads succeed.
pub(super) struct FailingCommitRepository {
    pub(super) inner: InMemoryApplicationRepository,
}

impl ApplicationRepository for FailingCommitRepository {
    fn insert(
        &self,
        application: Application,
        activity: Activity,
        series: &NumberSeries,
    ) -> Result<Application, RepositoryError> {
        self.inner.insert(application, activity, series)
    }

    fn commit(&self, _change: ChangeSet) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("transaction aborted".to_string()))
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        self.inner.list(filter)
    }

    fn actor(&self, id: &UserId) -> Result<Option<Actor>, RepositoryError> {
        self.inner.actor(id)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(
        &self,
        _application: Application,
        _activity: Activity,
        _series: &NumberSeries,
    ) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _change: ChangeSet) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn actor(&self, _id: &UserId) -> Result<Option<Actor>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct RefusingPublisher;

impl NotificationPublisher for RefusingPublisher {
    fn publish(&self, _notification: ApplicantNotification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay down".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
