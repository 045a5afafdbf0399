use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::authorization::Role;
use super::reconciliation::{ApplicantField, FieldValues, ProfileSnapshot};
use super::status::ApplicationStatus;

/// Opaque identifier for a loan application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable sequential number (`APP-2025-007`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationNumber(pub String);

impl ApplicationNumber {
    pub fn format(prefix: &str, year: i32, sequence: usize) -> Self {
        Self(format!("{prefix}-{year}-{sequence:03}"))
    }

    /// Placeholder carried by a draft until the store numbers it.
    pub fn unassigned() -> Self {
        Self(String::new())
    }
}

/// Prefix and year new application numbers are minted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberSeries {
    pub prefix: String,
    pub year: i32,
}

impl NumberSeries {
    pub fn new(prefix: impl Into<String>, year: i32) -> Self {
        Self {
            prefix: prefix.into(),
            year,
        }
    }

    pub fn number(&self, sequence: usize) -> ApplicationNumber {
        ApplicationNumber::format(&self.prefix, self.year, sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated caller as resolved by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }
}

/// Requested loan parameters captured on the first step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerms {
    pub product_id: String,
    pub amount: u32,
    pub term_months: u16,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<f64>,
}

/// The central entity. Never deleted; it progresses to a terminal status instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub application_number: ApplicationNumber,
    pub applicant_id: UserId,
    pub applicant_email: String,
    pub terms: LoanTerms,
    pub status: ApplicationStatus,
    pub status_changed_at: DateTime<Utc>,
    pub current_step: u8,
    pub fields: FieldValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_snapshot: Option<ProfileSnapshot>,
    #[serde(default)]
    pub changed_fields: BTreeSet<ApplicantField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub los_reference_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub los_routing_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every committed change.
    pub version: u64,
}

impl Application {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.applicant_id == user
    }

    /// The applicant may only edit while the application is still a draft.
    pub fn accepts_applicant_edits(&self) -> bool {
        self.status == ApplicationStatus::Draft
    }

    /// Elapsed time since the last status mutation, never negative.
    pub fn time_in_status(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now - self.status_changed_at;
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }
}

/// Source of the current instant; swapped for a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
