use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::decision::Decision;
use super::domain::{ApplicationId, UserId};

/// Kind of mutating action recorded in the trail.
///
/// Stored as free text; anything outside the known vocabulary round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityAction {
    CreatedApplication,
    UpdatedApplication,
    SubmittedApplication,
    StatusChanged,
    UploadedDocument,
    Decision(Decision),
    Other(String),
}

impl ActivityAction {
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Self::CreatedApplication => Cow::Borrowed("created_application"),
            Self::UpdatedApplication => Cow::Borrowed("updated_application"),
            Self::SubmittedApplication => Cow::Borrowed("submitted_application"),
            Self::StatusChanged => Cow::Borrowed("status_changed"),
            Self::UploadedDocument => Cow::Borrowed("uploaded_document"),
            Self::Decision(decision) => Cow::Owned(format!("decision_{}", decision.as_str())),
            Self::Other(action) => Cow::Borrowed(action.as_str()),
        }
    }

    /// Whether this action records a change of status.
    pub fn moves_status(&self) -> bool {
        matches!(
            self,
            Self::StatusChanged | Self::SubmittedApplication | Self::Decision(_)
        )
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let action = match value {
            "created_application" => Self::CreatedApplication,
            "updated_application" => Self::UpdatedApplication,
            "submitted_application" => Self::SubmittedApplication,
            "status_changed" => Self::StatusChanged,
            "uploaded_document" => Self::UploadedDocument,
            other => match other
                .strip_prefix("decision_")
                .and_then(|decision| decision.parse::<Decision>().ok())
            {
                Some(decision) => Self::Decision(decision),
                None => Self::Other(other.to_string()),
            },
        };
        Ok(action)
    }
}

impl Serialize for ActivityAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.parse::<ActivityAction>() {
            Ok(action) => Ok(action),
            Err(never) => match never {},
        }
    }
}

/// Append-only audit entry. Never mutated or deleted once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub application_id: ApplicationId,
    pub actor_id: UserId,
    pub action: ActivityAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        application_id: ApplicationId,
        actor_id: UserId,
        action: ActivityAction,
        detail: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            application_id,
            actor_id,
            action,
            detail: detail.filter(|detail| !detail.trim().is_empty()),
            created_at,
        }
    }
}

/// Newest entries first, ties broken by reverse insertion order.
pub fn newest_first<T: Clone>(entries: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut ordered: Vec<(usize, &T)> = entries.iter().enumerate().collect();
    ordered.sort_by(|(lhs_index, lhs), (rhs_index, rhs)| {
        created_at(*rhs)
            .cmp(&created_at(*lhs))
            .then(rhs_index.cmp(lhs_index))
    });
    ordered.into_iter().map(|(_, entry)| entry.clone()).collect()
}
