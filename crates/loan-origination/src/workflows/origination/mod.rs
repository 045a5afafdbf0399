//! Loan application lifecycle: status registry, transition rules, decisions, profile
//! reconciliation, and the audit trail.
//!
//! Pure validation lives in `engine` and `decision`; every write goes through
//! [`ApplicationRepository::commit`] so a rejected request never leaves partial state behind.

pub mod audit;
pub mod authorization;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod memory;
pub mod reconciliation;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use audit::{Activity, ActivityAction};
pub use authorization::{check_transition, is_authorized, Role, TransitionDenial};
pub use decision::{decision_target, record_decision, Decision, Review, StagedDecision};
pub use domain::{
    Actor, Application, ApplicationId, ApplicationNumber, Clock, LoanTerms, NumberSeries,
    SystemClock, UserId,
};
pub use engine::{
    apply_transition, format_duration, save_fields, submit, StagedChange, TransitionRequest,
    WorkflowError,
};
pub use memory::{InMemoryApplicationRepository, InMemoryNotificationPublisher, StaticProfileSource};
pub use reconciliation::{
    reconcile, ApplicantField, ExternalProfile, FieldChange, FieldEdits, FieldGroup, FieldValues,
    ProfileSnapshot, ProfileSource, ProfileSourceError,
};
pub use repository::{
    ApplicantNotification, ApplicationDetail, ApplicationFilter, ApplicationRecord,
    ApplicationRepository, ChangeSet, NotificationError, NotificationPublisher, RepositoryError,
};
pub use router::application_router;
pub use service::{
    ApplicationServiceError, ApplicationSummary, DocumentUpload, ErrorKind,
    LoanApplicationService, NewApplication, PipelineEntry, SaveRequest, StatusChangeRequest,
};
pub use status::{stage_state, ApplicationStatus, PipelineStage, StatusGeneration, StepState};
pub use transitions::{allowed_destinations, can_transition, suggested_reasons};
