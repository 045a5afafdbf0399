use loan_origination::error::AppError;
use loan_origination::workflows::origination::{
    Actor, ApplicantField, ApplicantNotification, ExternalProfile, FieldValues,
    NotificationError, NotificationPublisher, Role, StaticProfileSource,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Users and external profiles loaded at start-up for the in-process adapters.
#[derive(Debug, Default)]
pub(crate) struct Seed {
    pub(crate) actors: Vec<Actor>,
    pub(crate) profiles: StaticProfileSource,
}

#[derive(Debug, Default, Deserialize)]
struct SeedDocument {
    #[serde(default)]
    actors: Vec<Actor>,
    #[serde(default)]
    profiles: BTreeMap<String, BTreeMap<String, String>>,
}

/// Parse a seed document: `{ "actors": [{"id", "role"}], "profiles": { email: { field: value } } }`.
pub(crate) fn parse_seed(raw: &str) -> Result<Seed, AppError> {
    let document: SeedDocument = serde_json::from_str(raw).map_err(invalid_seed)?;

    let mut profiles = Vec::with_capacity(document.profiles.len());
    for (email, raw_values) in document.profiles {
        let mut values = FieldValues::new();
        for (key, value) in raw_values {
            let field = key.parse::<ApplicantField>().map_err(invalid_seed)?;
            values.insert(field, value);
        }
        profiles.push((email, ExternalProfile { values }));
    }

    Ok(Seed {
        actors: document.actors,
        profiles: StaticProfileSource::new(profiles),
    })
}

pub(crate) fn load_seed(path: &Path) -> Result<Seed, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let seed = parse_seed(&raw)?;
    info!(
        path = %path.display(),
        actors = seed.actors.len(),
        profiles = seed.profiles.len(),
        "loaded seed data"
    );
    Ok(seed)
}

fn invalid_seed<E>(err: E) -> AppError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    AppError::Io(io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Actors used by the CLI demo.
pub(crate) fn demo_actors() -> Vec<Actor> {
    vec![
        Actor::new("applicant-1", Role::Member),
        Actor::new("underwriter-1", Role::Staff),
        Actor::new("manager-1", Role::Admin),
    ]
}

/// Writes applicant notifications to the log instead of a mail relay.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingNotificationPublisher;

impl NotificationPublisher for LoggingNotificationPublisher {
    fn publish(&self, notification: ApplicantNotification) -> Result<(), NotificationError> {
        info!(
            template = %notification.template,
            application_id = %notification.application_id,
            recipient = %notification.recipient,
            "applicant notification queued"
        );
        Ok(())
    }
}
