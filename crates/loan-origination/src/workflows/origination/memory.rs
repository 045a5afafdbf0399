//! Process-local adapters for the store, profile source, and notifications.
//!
//! The repository serialises every commit behind one lock and checks the expected version
//! before touching anything, which gives the same all-or-nothing and stale-write behaviour a
//! relational transaction with a version column would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::audit::Activity;
use super::domain::{Actor, Application, ApplicationId, NumberSeries, UserId};
use super::reconciliation::{ExternalProfile, ProfileSource, ProfileSourceError};
use super::repository::{
    ApplicantNotification, ApplicationFilter, ApplicationRecord, ApplicationRepository, ChangeSet,
    NotificationError, NotificationPublisher, RepositoryError,
};

#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
    actors: Arc<Mutex<HashMap<UserId, Actor>>>,
}

impl InMemoryApplicationRepository {
    pub fn with_actors(actors: impl IntoIterator<Item = Actor>) -> Self {
        let repository = Self::default();
        for actor in actors {
            repository.register_actor(actor);
        }
        repository
    }

    pub fn register_actor(&self, actor: Actor) {
        lock(&self.actors).insert(actor.id.clone(), actor);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(
        &self,
        mut application: Application,
        activity: Activity,
        series: &NumberSeries,
    ) -> Result<Application, RepositoryError> {
        let mut records = lock(&self.records);
        if records.contains_key(&application.id) {
            return Err(RepositoryError::Duplicate);
        }

        let mut sequence = records.len() + 1;
        let mut number = series.number(sequence);
        while records
            .values()
            .any(|record| record.application.application_number == number)
        {
            sequence += 1;
            number = series.number(sequence);
        }
        application.application_number = number;

        records.insert(
            application.id.clone(),
            ApplicationRecord::new(application.clone(), activity),
        );
        Ok(application)
    }

    fn commit(&self, change: ChangeSet) -> Result<Application, RepositoryError> {
        let mut records = lock(&self.records);
        let record = records
            .get_mut(change.application_id())
            .ok_or(RepositoryError::NotFound)?;

        let found = record.application.version;
        if found != change.expected_version() {
            return Err(RepositoryError::Conflict {
                expected: change.expected_version(),
                found,
            });
        }

        let (mut application, review, activities) = change.into_parts();
        application.version = found + 1;
        record.application = application.clone();
        record.reviews.extend(review);
        record.activities.extend(activities);
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(lock(&self.records).get(id).cloned())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        let records = lock(&self.records);
        let mut applications: Vec<Application> = records
            .values()
            .map(|record| &record.application)
            .filter(|application| match &filter.applicant_id {
                Some(applicant) => application.is_owned_by(applicant),
                None => true,
            })
            .cloned()
            .collect();
        applications.sort_by(|lhs, rhs| {
            rhs.created_at
                .cmp(&lhs.created_at)
                .then_with(|| rhs.id.cmp(&lhs.id))
        });
        Ok(applications)
    }

    fn actor(&self, id: &UserId) -> Result<Option<Actor>, RepositoryError> {
        Ok(lock(&self.actors).get(id).cloned())
    }
}

/// Profile lookup keyed by case-insensitive e-mail.
#[derive(Debug, Default, Clone)]
pub struct StaticProfileSource {
    profiles: HashMap<String, ExternalProfile>,
}

impl StaticProfileSource {
    pub fn new(profiles: impl IntoIterator<Item = (String, ExternalProfile)>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|(email, profile)| (normalize_identity(&email), profile))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn normalize_identity(identity: &str) -> String {
    identity.trim().to_ascii_lowercase()
}

impl ProfileSource for StaticProfileSource {
    fn fetch_profile(&self, identity: &str) -> Result<Option<ExternalProfile>, ProfileSourceError> {
        Ok(self.profiles.get(&normalize_identity(identity)).cloned())
    }
}

/// Keeps published notifications so callers can inspect them.
#[derive(Default, Clone)]
pub struct InMemoryNotificationPublisher {
    events: Arc<Mutex<Vec<ApplicantNotification>>>,
}

impl InMemoryNotificationPublisher {
    pub fn events(&self) -> Vec<ApplicantNotification> {
        lock(&self.events).clone()
    }
}

impl NotificationPublisher for InMemoryNotificationPublisher {
    fn publish(&self, notification: ApplicantNotification) -> Result<(), NotificationError> {
        lock(&self.events).push(notification);
        Ok(())
    }
}
