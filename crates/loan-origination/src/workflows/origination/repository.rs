use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::audit::{newest_first, Activity};
use super::decision::Review;
use super::domain::{Actor, Application, ApplicationId, NumberSeries, UserId};
use super::engine::StagedChange;
use super::reconciliation::{field_changes, FieldChange};

/// Stored aggregate: the application plus its reviews and activities in commit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application: Application,
    pub reviews: Vec<Review>,
    pub activities: Vec<Activity>,
}

impl ApplicationRecord {
    pub fn new(application: Application, activity: Activity) -> Self {
        Self {
            application,
            reviews: Vec::new(),
            activities: vec![activity],
        }
    }

    pub fn detail(&self) -> ApplicationDetail {
        let application = &self.application;
        ApplicationDetail {
            changes: field_changes(
                &application.fields,
                application.profile_snapshot.as_ref(),
                &application.changed_fields,
            ),
            application: application.clone(),
            reviews: newest_first(&self.reviews, |review| review.created_at),
            activities: newest_first(&self.activities, |activity| activity.created_at),
        }
    }
}

/// Read model for the detail endpoint: reviews and activities newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub changes: Vec<FieldChange>,
    pub reviews: Vec<Review>,
    pub activities: Vec<Activity>,
}

/// All writes of one operation. The store applies every part or none of it.
///
/// A change set cannot be built without at least one activity, so a committed mutation is
/// always audited.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    application: Application,
    expected_version: u64,
    review: Option<Review>,
    activities: Vec<Activity>,
}

impl ChangeSet {
    /// `expected_version` is the version the caller read before staging its change.
    pub fn new(application: Application, expected_version: u64, activity: Activity) -> Self {
        Self {
            application,
            expected_version,
            review: None,
            activities: vec![activity],
        }
    }

    pub fn from_staged(staged: StagedChange, expected_version: u64) -> Self {
        Self::new(staged.application, expected_version, staged.activity)
    }

    pub fn with_review(mut self, review: Review) -> Self {
        self.review = Some(review);
        self
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    /// Replace the staged application, e.g. after a later step built on top of it.
    pub fn with_application(mut self, application: Application) -> Self {
        self.application = application;
        self
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn application_id(&self) -> &ApplicationId {
        &self.application.id
    }

    pub fn expected_version(&self) -> u64 {
        self.expected_version
    }

    pub fn review(&self) -> Option<&Review> {
        self.review.as_ref()
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn into_parts(self) -> (Application, Option<Review>, Vec<Activity>) {
        (self.application, self.review, self.activities)
    }
}

/// Filter for listing applications.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub applicant_id: Option<UserId>,
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    /// Store a new application together with its creation activity.
    ///
    /// The store assigns the application number from `series` while it holds the write, so
    /// concurrent inserts never share a number. The sequence is the stored count plus one.
    fn insert(
        &self,
        application: Application,
        activity: Activity,
        series: &NumberSeries,
    ) -> Result<Application, RepositoryError>;

    /// Atomically apply `change`, failing with `Conflict` when the stored version moved on.
    fn commit(&self, change: ChangeSet) -> Result<Application, RepositoryError>;

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError>;

    fn actor(&self, id: &UserId) -> Result<Option<Actor>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound applicant messaging (e-mail templates live behind this).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: ApplicantNotification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantNotification {
    pub template: String,
    pub application_id: ApplicationId,
    pub recipient: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
