//! Validates and stages status changes and saves.
//!
//! Every function here is pure: it takes the application as read, returns the updated copy
//! plus the activity describing it, and leaves persistence to the caller's atomic commit.

use chrono::{DateTime, Duration, Utc};

use super::audit::{Activity, ActivityAction};
use super::authorization::{check_transition, TransitionDenial};
use super::domain::{Actor, Application};
use super::reconciliation::{reconcile, FieldEditError, FieldEdits};
use super::status::{ApplicationStatus, PipelineStage};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{to} is not reachable from {from}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("actor is not permitted to perform this action")]
    Forbidden,
}

impl WorkflowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<FieldEditError> for WorkflowError {
    fn from(value: FieldEditError) -> Self {
        Self::validation(value.field_key(), value.to_string())
    }
}

/// An explicit, staff-driven status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub to: ApplicationStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub los_reference_number: Option<String>,
    pub los_routing_reason: Option<String>,
}

impl TransitionRequest {
    pub fn to(status: ApplicationStatus) -> Self {
        Self {
            to: status,
            reason: None,
            notes: None,
            los_reference_number: None,
            los_routing_reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_los_reference(mut self, reference: impl Into<String>) -> Self {
        self.los_reference_number = Some(reference.into());
        self
    }

    pub fn with_los_routing_reason(mut self, reason: impl Into<String>) -> Self {
        self.los_routing_reason = Some(reason.into());
        self
    }
}

/// Updated application plus the one activity that records the change.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChange {
    pub application: Application,
    pub activity: Activity,
}

/// Validate `request` against the graph and the actor's role, then stage the change.
pub fn apply_transition(
    application: &Application,
    request: TransitionRequest,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StagedChange, WorkflowError> {
    let from = application.status;
    let to = request.to;

    check_transition(actor.role, from, to).map_err(|denial| match denial {
        TransitionDenial::NotInGraph => WorkflowError::InvalidTransition { from, to },
        TransitionDenial::RoleNotPermitted => WorkflowError::Forbidden,
    })?;

    let reference = non_blank(request.los_reference_number);
    let routing_reason = non_blank(request.los_routing_reason);
    if !to.hands_off_externally() {
        if reference.is_some() {
            return Err(WorkflowError::validation(
                "losReferenceNumber",
                "only applies when routing to TO_LOS",
            ));
        }
        if routing_reason.is_some() {
            return Err(WorkflowError::validation(
                "losRoutingReason",
                "only applies when routing to TO_LOS",
            ));
        }
    }

    let mut updated = application.clone();
    set_status(&mut updated, to, now);
    if to.hands_off_externally() {
        updated.los_reference_number = reference;
        updated.los_routing_reason = routing_reason;
    }

    let detail = transition_detail(
        from,
        to,
        non_blank(request.reason),
        non_blank(request.notes),
    );
    let activity = Activity::new(
        updated.id.clone(),
        actor.id.clone(),
        ActivityAction::StatusChanged,
        Some(detail),
        now,
    );

    Ok(StagedChange {
        application: updated,
        activity,
    })
}

/// Move a draft into screening on behalf of its applicant.
pub fn submit(
    application: &Application,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StagedChange, WorkflowError> {
    if !application.is_owned_by(&actor.id) && !actor.role.may_review() {
        return Err(WorkflowError::Forbidden);
    }

    let from = application.status;
    let to = ApplicationStatus::Screening;
    if from != ApplicationStatus::Draft {
        return Err(WorkflowError::InvalidTransition { from, to });
    }

    let mut updated = application.clone();
    set_status(&mut updated, to, now);
    updated.submitted_at = Some(now);

    let activity = Activity::new(
        updated.id.clone(),
        actor.id.clone(),
        ActivityAction::SubmittedApplication,
        Some("Application submitted for review".to_string()),
        now,
    );

    Ok(StagedChange {
        application: updated,
        activity,
    })
}

/// Apply field edits, re-derive the changed-field set, and stage an update activity.
pub fn save_fields(
    application: &Application,
    edits: &FieldEdits,
    current_step: Option<u8>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StagedChange, WorkflowError> {
    let permitted = if actor.role.may_review() {
        !application.status.is_terminal()
    } else {
        application.is_owned_by(&actor.id) && application.accepts_applicant_edits()
    };
    if !permitted {
        return Err(WorkflowError::Forbidden);
    }

    let mut updated = application.clone();
    let touched = edits.apply_to(&mut updated.fields);
    if let Some(step) = current_step {
        updated.current_step = step;
    }
    updated.changed_fields = reconcile(&updated.fields, updated.profile_snapshot.as_ref());
    updated.updated_at = now;

    let mut detail = match current_step {
        Some(step) => format!("Updated step {step}"),
        None => format!("Updated {} field(s)", touched.len()),
    };
    if !updated.changed_fields.is_empty() {
        let keys: Vec<&str> = updated.changed_fields.iter().map(|field| field.key()).collect();
        detail.push_str(&format!("; differs from profile: {}", keys.join(", ")));
    }

    let activity = Activity::new(
        updated.id.clone(),
        actor.id.clone(),
        ActivityAction::UpdatedApplication,
        Some(detail),
        now,
    );

    Ok(StagedChange {
        application: updated,
        activity,
    })
}

/// Status mutation shared by transitions, submissions, and decisions.
pub(crate) fn set_status(application: &mut Application, to: ApplicationStatus, now: DateTime<Utc>) {
    application.status = to;
    application.status_changed_at = now;
    application.updated_at = now;
}

fn transition_detail(
    from: ApplicationStatus,
    to: ApplicationStatus,
    reason: Option<String>,
    notes: Option<String>,
) -> String {
    match (reason, notes) {
        (Some(reason), Some(notes)) => format!("{reason}: {notes}"),
        (Some(text), None) | (None, Some(text)) => text,
        (None, None) => format!("{from} -> {to}"),
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn time_in_status(application: &Application, now: DateTime<Utc>) -> Duration {
    application.time_in_status(now)
}

/// `3d 4h` once a day has passed, `5h` before that.
pub fn format_duration(duration: Duration) -> String {
    let hours = duration.num_hours().max(0);
    let days = hours / 24;
    if days > 0 {
        format!("{days}d {}h", hours % 24)
    } else {
        format!("{hours}h")
    }
}

/// Display-only; REJECTED and COMPLETED both report 100.
pub fn progress_percentage(status: ApplicationStatus) -> u8 {
    status.progress_percentage()
}

pub fn stage_of(status: ApplicationStatus) -> Option<PipelineStage> {
    status.stage()
}
