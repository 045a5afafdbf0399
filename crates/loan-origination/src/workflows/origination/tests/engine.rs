use super::common::*;
use crate::workflows::origination::audit::ActivityAction;
use crate::workflows::origination::domain::UserId;
use crate::workflows::origination::engine::{
    apply_transition, format_duration, save_fields, submit, TransitionRequest, WorkflowError,
};
use crate::workflows::origination::reconciliation::{ApplicantField, FieldEdits};
use crate::workflows::origination::status::ApplicationStatus;
use chrono::Duration;

#[test]
fn valid_transition_stamps_time_and_stages_one_activity() {
    let application = application_in(ApplicationStatus::Screening);
    let now = fixed_now();

    let staged = apply_transition(
        &application,
        TransitionRequest::to(ApplicationStatus::Underwriting)
            .with_reason("Passed initial screening")
            .with_notes("Bureau pull clean"),
        &staff(),
        now,
    )
    .expect("staff may move screening forward");

    assert_eq!(staged.application.status, ApplicationStatus::Underwriting);
    assert_eq!(staged.application.status_changed_at, now);
    assert_eq!(staged.application.updated_at, now);
    assert_eq!(staged.activity.action, ActivityAction::StatusChanged);
    assert_eq!(
        staged.activity.detail.as_deref(),
        Some("Passed initial screening: Bureau pull clean")
    );
    assert_eq!(staged.activity.actor_id, staff().id);
    assert_eq!(application.status, ApplicationStatus::Screening, "input untouched");
}

#[test]
fn transition_without_reason_describes_the_move() {
    let application = application_in(ApplicationStatus::Signed);

    let staged = apply_transition(
        &application,
        TransitionRequest::to(ApplicationStatus::Releasing),
        &staff(),
        fixed_now(),
    )
    .expect("staff may release signed loans");

    assert_eq!(
        staged.activity.detail.as_deref(),
        Some("SIGNED -> RELEASING")
    );
}

#[test]
fn routing_to_los_keeps_the_reference() {
    let application = application_in(ApplicationStatus::Screening);

    let staged = apply_transition(
        &application,
        TransitionRequest::to(ApplicationStatus::ToLos)
            .with_reason("Self-employed applicant")
            .with_los_reference(" LOS-88231 ")
            .with_los_routing_reason("Self-employed, two businesses"),
        &staff(),
        fixed_now(),
    )
    .expect("staff may route to LOS");

    assert_eq!(
        staged.application.los_reference_number.as_deref(),
        Some("LOS-88231")
    );
    assert_eq!(
        staged.application.los_routing_reason.as_deref(),
        Some("Self-employed, two businesses")
    );
}

#[test]
fn los_reference_is_rejected_for_other_destinations() {
    let application = application_in(ApplicationStatus::Screening);

    let result = apply_transition(
        &application,
        TransitionRequest::to(ApplicationStatus::Underwriting).with_los_reference("LOS-1"),
        &staff(),
        fixed_now(),
    );

    match result {
        Err(WorkflowError::Validation { field, .. }) => assert_eq!(field, "losReferenceNumber"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn member_cannot_drive_any_transition() {
    let application = application_in(ApplicationStatus::Screening);

    let result = apply_transition(
        &application,
        TransitionRequest::to(ApplicationStatus::Underwriting),
        &applicant(),
        fixed_now(),
    );

    assert_eq!(result, Err(WorkflowError::Forbidden));
}

#[test]
fn submit_moves_draft_into_screening() {
    let application = application_in(ApplicationStatus::Draft);
    let now = fixed_now();

    let staged = submit(&application, &applicant(), now).expect("owner may submit");

    assert_eq!(staged.application.status, ApplicationStatus::Screening);
    assert_eq!(staged.application.submitted_at, Some(now));
    assert_eq!(staged.application.status_changed_at, now);
    assert_eq!(staged.activity.action, ActivityAction::SubmittedApplication);
}

#[test]
fn submit_rejects_other_members_and_non_drafts() {
    let draft = application_in(ApplicationStatus::Draft);
    assert_eq!(
        submit(&draft, &other_applicant(), fixed_now()),
        Err(WorkflowError::Forbidden)
    );

    let screening = application_in(ApplicationStatus::Screening);
    assert_eq!(
        submit(&screening, &applicant(), fixed_now()),
        Err(WorkflowError::InvalidTransition {
            from: ApplicationStatus::Screening,
            to: ApplicationStatus::Screening,
        })
    );
}

#[test]
fn applicant_edits_are_limited_to_their_own_draft() {
    let edits = FieldEdits::default().set(ApplicantField::Phone, "555-0100");

    let draft = application_in(ApplicationStatus::Draft);
    let staged = save_fields(&draft, &edits, Some(2), &applicant(), fixed_now())
        .expect("owner may edit draft");
    assert_eq!(staged.application.current_step, 2);
    assert_eq!(staged.activity.action, ActivityAction::UpdatedApplication);
    assert_eq!(staged.activity.detail.as_deref(), Some("Updated step 2"));

    assert_eq!(
        save_fields(&draft, &edits, None, &other_applicant(), fixed_now()),
        Err(WorkflowError::Forbidden)
    );

    let screening = application_in(ApplicationStatus::Screening);
    assert_eq!(
        save_fields(&screening, &edits, None, &applicant(), fixed_now()),
        Err(WorkflowError::Forbidden)
    );
}

#[test]
fn staff_corrections_are_refused_once_terminal() {
    let edits = FieldEdits::default().set(ApplicantField::City, "Halifax");

    let underwriting = application_in(ApplicationStatus::Underwriting);
    assert!(save_fields(&underwriting, &edits, None, &staff(), fixed_now()).is_ok());

    let rejected = application_in(ApplicationStatus::Rejected);
    assert_eq!(
        save_fields(&rejected, &edits, None, &staff(), fixed_now()),
        Err(WorkflowError::Forbidden)
    );
}

#[test]
fn save_reports_profile_divergence_in_the_activity() {
    let draft = application_in(ApplicationStatus::Draft);
    let edits = FieldEdits::default().set(ApplicantField::AnnualIncome, "95,000");

    let staged = save_fields(&draft, &edits, None, &applicant(), fixed_now()).expect("save");

    assert!(staged
        .application
        .changed_fields
        .contains(&ApplicantField::AnnualIncome));
    assert_eq!(
        staged.activity.detail.as_deref(),
        Some("Updated 1 field(s); differs from profile: annualIncome")
    );
    assert_eq!(staged.activity.actor_id, UserId(APPLICANT.to_string()));
}

#[test]
fn resubmitted_values_are_not_counted_as_updates() {
    let draft = application_in(ApplicationStatus::Draft);
    let edits = FieldEdits::default()
        .set(ApplicantField::FirstName, "Jordan")
        .set(ApplicantField::EmployerName, "Northwind Freight")
        .set(ApplicantField::AnnualIncome, "95000");

    let staged = save_fields(&draft, &edits, None, &applicant(), fixed_now()).expect("save");

    assert_eq!(
        staged.activity.detail.as_deref(),
        Some("Updated 1 field(s); differs from profile: annualIncome")
    );

    let unchanged = FieldEdits::default().set(ApplicantField::LastName, "Reyes");
    let staged = save_fields(&draft, &unchanged, None, &applicant(), fixed_now()).expect("save");
    assert_eq!(staged.activity.detail.as_deref(), Some("Updated 0 field(s)"));
}

#[test]
fn durations_render_days_and_hours() {
    assert_eq!(format_duration(Duration::hours(5)), "5h");
    assert_eq!(format_duration(Duration::hours(52)), "2d 4h");
    assert_eq!(format_duration(Duration::minutes(30)), "0h");
    assert_eq!(format_duration(Duration::hours(-3)), "0h");
}

#[test]
fn time_in_status_is_never_negative() {
    let mut application = application_in(ApplicationStatus::Screening);
    application.status_changed_at = fixed_now() + Duration::hours(1);

    assert_eq!(application.time_in_status(fixed_now()), Duration::zero());
}
