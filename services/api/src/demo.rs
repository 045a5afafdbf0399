use crate::infra::demo_actors;
use clap::Args;
use loan_origination::config::OriginationConfig;
use loan_origination::error::AppError;
use loan_origination::workflows::origination::{
    allowed_destinations, ApplicantField, ApplicationStatus, Decision, ExternalProfile,
    FieldEdits, FieldValues, InMemoryApplicationRepository, InMemoryNotificationPublisher,
    LoanApplicationService, LoanTerms, NewApplication, SaveRequest, StaticProfileSource,
    StatusChangeRequest, TransitionRequest, UserId,
};
use std::sync::Arc;

const DEMO_EMAIL: &str = "casey.morgan@example.com";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Decision recorded once the application reaches DECISION_PENDING
    #[arg(long, default_value = "approved")]
    pub(crate) decision: Decision,
    /// Annual income the applicant reports, diffed against the profile's 72000
    #[arg(long, default_value = "78500")]
    pub(crate) annual_income: String,
    /// Prefix for the generated application number
    #[arg(long, default_value = "APP")]
    pub(crate) number_prefix: String,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            decision: Decision::Approved,
            annual_income: "78500".to_string(),
            number_prefix: "APP".to_string(),
        }
    }
}

/// Print every status with its generation, progress and outgoing edges.
pub(crate) fn print_statuses() {
    println!(
        "{:<22} {:<8} {:>4}  {:<24} next",
        "status", "gen", "%", "label"
    );
    for status in ApplicationStatus::ALL {
        let generation = if status.is_legacy() { "legacy" } else { "current" };
        let next: Vec<&str> = allowed_destinations(status)
            .iter()
            .map(|to| to.as_str())
            .collect();
        let next = if next.is_empty() {
            "(terminal)".to_string()
        } else {
            next.join(", ")
        };
        println!(
            "{:<22} {:<8} {:>4}  {:<24} {}",
            status.as_str(),
            generation,
            status.progress_percentage(),
            status.label(),
            next
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        decision,
        annual_income,
        number_prefix,
    } = args;

    let repository = Arc::new(InMemoryApplicationRepository::with_actors(demo_actors()));
    let notifications = Arc::new(InMemoryNotificationPublisher::default());
    let service = LoanApplicationService::new(
        repository,
        Arc::new(demo_profiles()),
        notifications.clone(),
        OriginationConfig {
            number_prefix,
            profile_seed: None,
        },
    );

    let applicant = UserId("applicant-1".to_string());
    let underwriter = UserId("underwriter-1".to_string());
    let manager = UserId("manager-1".to_string());

    println!("Loan origination demo");
    let application = service.start(NewApplication {
        applicant_id: applicant.clone(),
        applicant_email: DEMO_EMAIL.to_string(),
        terms: LoanTerms {
            product_id: "personal-fixed".to_string(),
            amount: 15_000,
            term_months: 36,
            purpose: "Home renovation".to_string(),
            monthly_payment: Some(468.12),
        },
    })?;
    println!(
        "  Started {} ({}) for {}",
        application.application_number.0, application.id, application.applicant_email
    );

    let saved = service.save(
        &application.id,
        SaveRequest {
            user_id: applicant.clone(),
            edits: FieldEdits::default().set(ApplicantField::AnnualIncome, annual_income),
            current_step: Some(3),
            expected_version: Some(application.version),
        },
    )?;
    let changed: Vec<&str> = saved.changed_fields.iter().map(|field| field.key()).collect();
    if changed.is_empty() {
        println!("  Applicant data matches the existing profile");
    } else {
        println!("  Fields differing from profile: {}", changed.join(", "));
    }

    service.submit(&application.id, &applicant)?;

    let steps = [
        (
            &underwriter,
            ApplicationStatus::Underwriting,
            "Passed initial screening",
        ),
        (
            &manager,
            ApplicationStatus::DecisionPending,
            "Credit review complete",
        ),
    ];
    for (actor, to, reason) in steps {
        service.change_status(
            &application.id,
            StatusChangeRequest {
                user_id: actor.clone(),
                transition: TransitionRequest::to(to).with_reason(reason),
                edits: FieldEdits::default(),
                expected_version: None,
            },
        )?;
    }

    let review = service.record_decision(
        &application.id,
        &underwriter,
        decision,
        "Reviewed income and credit file",
    )?;
    println!("  Decision recorded: {} by {}", review.decision, review.reviewer_id);

    let detail = service.get(&application.id)?;
    let status = detail.application.status;
    println!(
        "  Status: {} ({}% complete)",
        status.label(),
        status.progress_percentage()
    );
    for step in status.next_steps() {
        println!("    - {step}");
    }

    if !detail.changes.is_empty() {
        println!("\nProfile differences");
        for change in &detail.changes {
            println!(
                "  {}: {} -> {}",
                change.label,
                change.original_value,
                change.current_value.as_deref().unwrap_or("(cleared)")
            );
        }
    }

    println!("\nAudit trail (newest first)");
    for activity in &detail.activities {
        println!(
            "  {} {:<22} {:<14} {}",
            activity.created_at.format("%Y-%m-%d %H:%M:%S"),
            activity.action.as_str(),
            activity.actor_id.0,
            activity.detail.as_deref().unwrap_or("")
        );
    }

    let events = notifications.events();
    if events.is_empty() {
        println!("\nNotifications: none");
    } else {
        println!("\nNotifications");
        for event in events {
            println!("  {} -> {}", event.template, event.recipient);
        }
    }

    Ok(())
}

fn demo_profiles() -> StaticProfileSource {
    let mut values = FieldValues::new();
    values.insert(ApplicantField::FirstName, "Casey".to_string());
    values.insert(ApplicantField::LastName, "Morgan".to_string());
    values.insert(ApplicantField::Email, DEMO_EMAIL.to_string());
    values.insert(ApplicantField::AnnualIncome, "72000".to_string());
    values.insert(ApplicantField::EmployerName, "Harbourview Clinic".to_string());
    values.insert(ApplicantField::Province, "NS".to_string());

    StaticProfileSource::new([(DEMO_EMAIL.to_string(), ExternalProfile { values })])
}
