use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OriginationConfig;

use super::audit::{Activity, ActivityAction};
use super::decision::{record_decision, Decision, Review};
use super::domain::{
    Actor, Application, ApplicationId, ApplicationNumber, Clock, LoanTerms, NumberSeries,
    SystemClock, UserId,
};
use super::engine::{self, non_blank, StagedChange, TransitionRequest, WorkflowError};
use super::reconciliation::{
    reconcile, FieldEdits, FieldValues, ProfileSnapshot, ProfileSource, ProfileSourceError,
};
use super::repository::{
    ApplicantNotification, ApplicationDetail, ApplicationFilter, ApplicationRecord,
    ApplicationRepository, ChangeSet, NotificationPublisher, RepositoryError,
};
use super::status::{ApplicationStatus, BadgeTone, PipelineStage};

/// Use-case facade over the workflow core and its collaborators.
///
/// Each operation reads the application once, stages its change with the pure engine
/// functions, and hands the whole change set to the store in one commit.
pub struct LoanApplicationService<R, P, N> {
    repository: Arc<R>,
    profiles: Arc<P>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    config: OriginationConfig,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("loan-{id:06}"))
}

/// Payload for starting a new application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub applicant_id: UserId,
    pub applicant_email: String,
    #[serde(flatten)]
    pub terms: LoanTerms,
}

/// A plain save of applicant data.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub user_id: UserId,
    pub edits: FieldEdits,
    pub current_step: Option<u8>,
    pub expected_version: Option<u64>,
}

/// An explicit status change, optionally carrying staff corrections to applicant data.
#[derive(Debug, Clone)]
pub struct StatusChangeRequest {
    pub user_id: UserId,
    pub transition: TransitionRequest,
    pub edits: FieldEdits,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    pub user_id: UserId,
    pub document_type: String,
    pub file_name: String,
}

/// Row on an applicant's list of applications.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub application_number: ApplicationNumber,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub badge: BadgeTone,
    pub progress: u8,
    pub amount: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<&Application> for ApplicationSummary {
    fn from(application: &Application) -> Self {
        Self {
            id: application.id.clone(),
            application_number: application.application_number.clone(),
            status: application.status,
            status_label: application.status.label(),
            badge: application.status.badge(),
            progress: application.status.progress_percentage(),
            amount: application.terms.amount,
            created_at: application.created_at,
            submitted_at: application.submitted_at,
        }
    }
}

/// Staff dashboard row with aging information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEntry {
    pub id: ApplicationId,
    pub application_number: ApplicationNumber,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub badge: BadgeTone,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    pub seconds_in_status: i64,
    pub time_in_status: String,
    pub changed_field_count: usize,
}

impl<R, P, N> LoanApplicationService<R, P, N>
where
    R: ApplicationRepository + 'static,
    P: ProfileSource + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        profiles: Arc<P>,
        notifications: Arc<N>,
        config: OriginationConfig,
    ) -> Self {
        Self {
            repository,
            profiles,
            notifications,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a draft, capturing the external profile snapshot exactly once.
    pub fn start(&self, request: NewApplication) -> Result<Application, ApplicationServiceError> {
        let NewApplication {
            applicant_id,
            applicant_email,
            terms,
        } = request;

        let applicant_email = non_blank(Some(applicant_email))
            .ok_or_else(|| WorkflowError::validation("applicantEmail", "is required"))?;
        if terms.product_id.trim().is_empty() {
            return Err(WorkflowError::validation("productId", "is required").into());
        }
        if terms.amount == 0 {
            return Err(WorkflowError::validation("amount", "must be greater than zero").into());
        }
        if terms.term_months == 0 {
            return Err(
                WorkflowError::validation("termMonths", "must be greater than zero").into(),
            );
        }

        let actor = self.resolve_actor(&applicant_id)?;
        let now = self.clock.now();

        let profile_snapshot = self
            .profiles
            .fetch_profile(&applicant_email)?
            .map(|profile| ProfileSnapshot::capture(profile.values, now));
        let fields: FieldValues = profile_snapshot
            .as_ref()
            .map(|snapshot| snapshot.values.clone())
            .unwrap_or_default();
        let changed_fields = reconcile(&fields, profile_snapshot.as_ref());

        let series = NumberSeries::new(self.config.number_prefix.clone(), now.year());
        let application = Application {
            id: next_application_id(),
            application_number: ApplicationNumber::unassigned(),
            applicant_id,
            applicant_email,
            terms,
            status: ApplicationStatus::Draft,
            status_changed_at: now,
            current_step: 1,
            fields,
            profile_snapshot,
            changed_fields,
            los_reference_number: None,
            los_routing_reason: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let activity = Activity::new(
            application.id.clone(),
            actor.id.clone(),
            ActivityAction::CreatedApplication,
            Some(format!(
                "Requested {} over {} months",
                application.terms.amount, application.terms.term_months
            )),
            now,
        );

        let stored = self.repository.insert(application, activity, &series)?;
        info!(
            application_id = %stored.id,
            number = %stored.application_number.0,
            existing_profile = stored.profile_snapshot.is_some(),
            "application started"
        );
        Ok(stored)
    }

    /// Save applicant data and recompute the changed-field set.
    pub fn save(
        &self,
        application_id: &ApplicationId,
        request: SaveRequest,
    ) -> Result<Application, ApplicationServiceError> {
        let record = self.load(application_id)?;
        let version = self.check_version(&record, request.expected_version)?;
        let actor = self.resolve_actor(&request.user_id)?;

        let staged = engine::save_fields(
            &record.application,
            &request.edits,
            request.current_step,
            &actor,
            self.clock.now(),
        )?;

        let stored = self
            .repository
            .commit(ChangeSet::from_staged(staged, version))?;
        debug!(
            application_id = %stored.id,
            changed_fields = stored.changed_fields.len(),
            "application saved"
        );
        Ok(stored)
    }

    /// Explicit status change. Field corrections in the same request share its commit.
    pub fn change_status(
        &self,
        application_id: &ApplicationId,
        request: StatusChangeRequest,
    ) -> Result<Application, ApplicationServiceError> {
        let record = self.load(application_id)?;
        let version = self.check_version(&record, request.expected_version)?;
        let actor = self.resolve_actor(&request.user_id)?;
        let now = self.clock.now();
        let from = record.application.status;

        let change = if request.edits.is_empty() {
            let staged = engine::apply_transition(
                &record.application,
                request.transition,
                &actor,
                now,
            )?;
            ChangeSet::from_staged(staged, version)
        } else {
            // Graph and role checks precede the edit checks.
            engine::apply_transition(&record.application, request.transition.clone(), &actor, now)?;
            if !actor.role.may_review() {
                return Err(WorkflowError::Forbidden.into());
            }
            let saved = engine::save_fields(&record.application, &request.edits, None, &actor, now)?;
            let StagedChange {
                application,
                activity,
            } = engine::apply_transition(&saved.application, request.transition, &actor, now)?;
            ChangeSet::from_staged(saved, version)
                .with_application(application)
                .with_activity(activity)
        };

        let stored = self.repository.commit(change)?;
        info!(
            application_id = %stored.id,
            from = %from,
            to = %stored.status,
            actor = %actor.id,
            "status changed"
        );
        Ok(stored)
    }

    /// Move a draft into screening and stamp the submission time.
    pub fn submit(
        &self,
        application_id: &ApplicationId,
        user_id: &UserId,
    ) -> Result<Application, ApplicationServiceError> {
        let record = self.load(application_id)?;
        let version = record.application.version;
        let actor = self.resolve_actor(user_id)?;

        let staged = engine::submit(&record.application, &actor, self.clock.now())?;
        let stored = self
            .repository
            .commit(ChangeSet::from_staged(staged, version))?;
        info!(application_id = %stored.id, "application submitted");
        Ok(stored)
    }

    /// Record a reviewer's decision: review, status change, and activity in one commit.
    ///
    /// Not idempotent. A repeated call creates a second review attempt, which the decision
    /// table rejects once the application has left a decision-eligible status.
    pub fn record_decision(
        &self,
        application_id: &ApplicationId,
        reviewer_id: &UserId,
        decision: Decision,
        notes: &str,
    ) -> Result<Review, ApplicationServiceError> {
        let record = self.load(application_id)?;
        let version = record.application.version;
        let reviewer = self.resolve_actor(reviewer_id)?;
        let from = record.application.status;

        let staged = record_decision(
            &record.application,
            decision,
            notes,
            &reviewer,
            self.clock.now(),
        )?;
        let review = staged.review.clone();
        let change = ChangeSet::new(staged.application, version, staged.activity)
            .with_review(staged.review);

        let stored = self.repository.commit(change)?;
        info!(
            application_id = %stored.id,
            decision = %decision,
            from = %from,
            to = %stored.status,
            reviewer = %reviewer.id,
            "decision recorded"
        );

        self.notify_decision(&stored, &review);
        Ok(review)
    }

    /// Record that a document was attached. Storage of the file itself happens elsewhere.
    pub fn record_document(
        &self,
        application_id: &ApplicationId,
        upload: DocumentUpload,
    ) -> Result<Activity, ApplicationServiceError> {
        let document_type = non_blank(Some(upload.document_type))
            .ok_or_else(|| WorkflowError::validation("documentType", "is required"))?;
        let file_name = non_blank(Some(upload.file_name))
            .ok_or_else(|| WorkflowError::validation("fileName", "is required"))?;

        let record = self.load(application_id)?;
        let version = record.application.version;
        let actor = self.resolve_actor(&upload.user_id)?;
        if !record.application.is_owned_by(&actor.id) && !actor.role.may_review() {
            return Err(WorkflowError::Forbidden.into());
        }

        let now = self.clock.now();
        let mut application = record.application;
        application.updated_at = now;
        let activity = Activity::new(
            application.id.clone(),
            actor.id.clone(),
            ActivityAction::UploadedDocument,
            Some(format!("{document_type}: {file_name}")),
            now,
        );

        self.repository
            .commit(ChangeSet::new(application, version, activity.clone()))?;
        debug!(application_id = %application_id, %document_type, "document recorded");
        Ok(activity)
    }

    /// Application with reviews, activities, and field changes for display.
    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationDetail, ApplicationServiceError> {
        Ok(self.load(application_id)?.detail())
    }

    pub fn list_for_applicant(
        &self,
        applicant_id: &UserId,
    ) -> Result<Vec<ApplicationSummary>, ApplicationServiceError> {
        let filter = ApplicationFilter {
            applicant_id: Some(applicant_id.clone()),
        };
        let applications = self.repository.list(&filter)?;
        Ok(applications.iter().map(ApplicationSummary::from).collect())
    }

    /// Every application with its aging, longest in status first.
    pub fn pipeline(&self) -> Result<Vec<PipelineEntry>, ApplicationServiceError> {
        let now = self.clock.now();
        let applications = self.repository.list(&ApplicationFilter::default())?;

        let mut entries: Vec<PipelineEntry> = applications
            .iter()
            .map(|application| {
                let elapsed = engine::time_in_status(application, now);
                PipelineEntry {
                    id: application.id.clone(),
                    application_number: application.application_number.clone(),
                    status: application.status,
                    status_label: application.status.label(),
                    badge: application.status.badge(),
                    progress: engine::progress_percentage(application.status),
                    stage: engine::stage_of(application.status),
                    seconds_in_status: elapsed.num_seconds(),
                    time_in_status: engine::format_duration(elapsed),
                    changed_field_count: application.changed_fields.len(),
                }
            })
            .collect();
        entries.sort_by(|lhs, rhs| {
            rhs.seconds_in_status
                .cmp(&lhs.seconds_in_status)
                .then_with(|| lhs.id.cmp(&rhs.id))
        });
        Ok(entries)
    }

    fn load(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.repository
            .fetch(application_id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(application_id.clone()))
    }

    /// Unknown users are refused without saying whether the id exists.
    fn resolve_actor(&self, user_id: &UserId) -> Result<Actor, ApplicationServiceError> {
        self.repository
            .actor(user_id)?
            .ok_or(ApplicationServiceError::Workflow(WorkflowError::Forbidden))
    }

    fn check_version(
        &self,
        record: &ApplicationRecord,
        expected: Option<u64>,
    ) -> Result<u64, ApplicationServiceError> {
        let found = record.application.version;
        match expected {
            Some(expected) if expected != found => {
                Err(RepositoryError::Conflict { expected, found }.into())
            }
            _ => Ok(found),
        }
    }

    fn notify_decision(&self, application: &Application, review: &Review) {
        let mut details = BTreeMap::new();
        details.insert(
            "application_number".to_string(),
            application.application_number.0.clone(),
        );
        details.insert("status".to_string(), application.status.as_str().to_string());
        details.insert(
            "status_title".to_string(),
            application.status.label().to_string(),
        );

        let notification = ApplicantNotification {
            template: format!("decision_{}", review.decision.as_str()),
            application_id: application.id.clone(),
            recipient: application.applicant_email.clone(),
            details,
        };

        if let Err(error) = self.notifications.publish(notification) {
            warn!(application_id = %application.id, %error, "decision notification not delivered");
        }
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Profile(#[from] ProfileSourceError),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    Forbidden,
    Conflict,
    NotFound,
    Persistence,
    Upstream,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::InvalidTransition => "invalid_transition",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Persistence => "persistence",
            Self::Upstream => "upstream",
        }
    }
}

impl ApplicationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Workflow(WorkflowError::Validation { .. }) => ErrorKind::Validation,
            Self::Workflow(WorkflowError::InvalidTransition { .. }) => ErrorKind::InvalidTransition,
            Self::Workflow(WorkflowError::Forbidden) => ErrorKind::Forbidden,
            Self::Repository(RepositoryError::Conflict { .. } | RepositoryError::Duplicate) => {
                ErrorKind::Conflict
            }
            Self::Repository(RepositoryError::NotFound) | Self::NotFound(_) => ErrorKind::NotFound,
            Self::Repository(RepositoryError::Unavailable(_)) => ErrorKind::Persistence,
            Self::Profile(_) => ErrorKind::Upstream,
        }
    }

    /// Field named by a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Workflow(WorkflowError::Validation { field, .. }) => Some(field.as_str()),
            _ => None,
        }
    }
}
