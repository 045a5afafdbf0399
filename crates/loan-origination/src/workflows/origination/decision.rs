//! Staff review decisions.
//!
//! A decision produces three writes (review row, status change, activity) that are staged
//! together here and committed as one change set by the service. There is no other entry
//! point that creates reviews.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::{Activity, ActivityAction};
use super::domain::{Actor, Application, ApplicationId, UserId};
use super::engine::{set_status, WorkflowError};
use super::status::{ApplicationStatus, StatusGeneration};
use super::transitions::can_transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Denied,
    MoreInfoNeeded,
}

impl Decision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::MoreInfoNeeded => "more_info_needed",
        }
    }

    /// Target status for an application currently in `generation`.
    pub const fn target(self, generation: StatusGeneration) -> ApplicationStatus {
        match (generation, self) {
            (StatusGeneration::Legacy, Self::Approved) => ApplicationStatus::LegacyApproved,
            (StatusGeneration::Legacy, Self::Denied) => ApplicationStatus::Denied,
            (StatusGeneration::Legacy, Self::MoreInfoNeeded) => ApplicationStatus::UnderReview,
            (StatusGeneration::Current, Self::Approved) => ApplicationStatus::Approved,
            (StatusGeneration::Current, Self::Denied) => ApplicationStatus::Rejected,
            (StatusGeneration::Current, Self::MoreInfoNeeded) => {
                ApplicationStatus::DecisionPending
            }
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decision '{0}'")]
pub struct UnknownDecision(pub String);

impl FromStr for Decision {
    type Err = UnknownDecision;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "more_info_needed" => Ok(Self::MoreInfoNeeded),
            other => Err(UnknownDecision(other.to_string())),
        }
    }
}

/// Statuses from which a reviewer may record a decision.
pub const DECISION_SOURCES: [ApplicationStatus; 4] = [
    ApplicationStatus::UnderReview,
    ApplicationStatus::Screening,
    ApplicationStatus::Underwriting,
    ApplicationStatus::DecisionPending,
];

/// One staff decision event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub application_id: ApplicationId,
    pub reviewer_id: UserId,
    pub decision: Decision,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Everything one decision writes, staged for a single commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedDecision {
    pub application: Application,
    pub review: Review,
    pub activity: Activity,
}

/// Resolve where `decision` takes an application sitting in `from`.
///
/// Current-generation targets must also be graph edges, except that requesting more
/// information on an application already awaiting a decision leaves it in place.
pub fn decision_target(
    from: ApplicationStatus,
    decision: Decision,
) -> Result<ApplicationStatus, WorkflowError> {
    let to = decision.target(from.generation());
    if !DECISION_SOURCES.contains(&from) {
        return Err(WorkflowError::InvalidTransition { from, to });
    }

    let reachable = from.is_legacy() || from == to || can_transition(from, to);
    if reachable {
        Ok(to)
    } else {
        Err(WorkflowError::InvalidTransition { from, to })
    }
}

/// Validate and stage a reviewer's decision.
pub fn record_decision(
    application: &Application,
    decision: Decision,
    notes: &str,
    reviewer: &Actor,
    now: DateTime<Utc>,
) -> Result<StagedDecision, WorkflowError> {
    let notes = notes.trim();
    if notes.is_empty() {
        return Err(WorkflowError::validation(
            "notes",
            "notes are required for every decision",
        ));
    }
    if !reviewer.role.may_review() {
        return Err(WorkflowError::Forbidden);
    }

    let from = application.status;
    let to = decision_target(from, decision)?;

    let mut updated = application.clone();
    if to == from {
        updated.updated_at = now;
    } else {
        set_status(&mut updated, to, now);
    }

    let review = Review {
        application_id: updated.id.clone(),
        reviewer_id: reviewer.id.clone(),
        decision,
        notes: notes.to_string(),
        created_at: now,
    };
    let activity = Activity::new(
        updated.id.clone(),
        reviewer.id.clone(),
        ActivityAction::Decision(decision),
        Some(notes.to_string()),
        now,
    );

    Ok(StagedDecision {
        application: updated,
        review,
        activity,
    })
}
