//! The hand-specified transition graph.
//!
//! Legacy statuses only ever appear as sources here: they map forward into the current
//! pipeline so records created by the old intake flow can be migrated, and no edge points
//! back into the legacy vocabulary.

use super::status::ApplicationStatus;

use ApplicationStatus::*;

/// Destinations reachable from `from` in a single step.
pub const fn allowed_destinations(from: ApplicationStatus) -> &'static [ApplicationStatus] {
    match from {
        Screening => &[Underwriting, Rejected, ToLos],
        Underwriting => &[DecisionPending, Rejected, ToLos],
        DecisionPending => &[Approved, Rejected],
        Approved => &[DocumentPreparation],
        DocumentPreparation => &[AwaitingSignatures],
        AwaitingSignatures => &[Signed],
        Signed => &[Releasing],
        Releasing => &[Disbursed],
        Disbursed => &[Completed],
        Rejected | Completed | ToLos => &[],
        Draft => &[Screening],
        Submitted => &[Screening, Underwriting],
        UnderReview => &[DecisionPending, Rejected],
        LegacyApproved => &[DocumentPreparation],
        Denied => &[Rejected],
        Withdrawn => &[],
    }
}

/// True when `(from, to)` is an edge of the graph.
pub fn can_transition(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    allowed_destinations(from).contains(&to)
}

/// Every edge of the graph, in registry order.
pub fn edges() -> impl Iterator<Item = (ApplicationStatus, ApplicationStatus)> {
    ApplicationStatus::ALL.into_iter().flat_map(|from| {
        allowed_destinations(from)
            .iter()
            .map(move |to| (from, *to))
    })
}

/// Canned reasons offered to staff when moving between two statuses.
pub fn suggested_reasons(from: ApplicationStatus, to: ApplicationStatus) -> &'static [&'static str] {
    match (from, to) {
        (Screening, Underwriting) => &[
            "Passed initial screening",
            "All required documents received",
            "Eligible for credit review",
        ],
        (Screening, Rejected) => &[
            "Incomplete application",
            "Missing required documents",
            "Does not meet eligibility criteria",
            "Citizenship/residency requirements not met",
        ],
        (Screening, ToLos) => &[
            "Complex income structure",
            "Self-employed applicant",
            "Multiple properties involved",
            "Requires manual underwriting",
        ],
        (Underwriting, DecisionPending) => &[
            "Credit review complete",
            "Risk assessment acceptable",
            "Ready for final decision",
        ],
        (Underwriting, Rejected) => &[
            "Credit score below threshold",
            "Debt-to-income ratio too high",
            "Insufficient income",
            "Negative credit history",
        ],
        (Underwriting, ToLos) => &[
            "Requires manual underwriting",
            "Exception review needed",
            "Complex financial situation",
            "Policy override required",
        ],
        (DecisionPending, Approved) => &[
            "Meets all lending criteria",
            "Committee approval granted",
            "Manager override approved",
        ],
        (DecisionPending, Rejected) => &[
            "Does not meet lending policy",
            "Committee declined",
            "Risk too high",
        ],
        _ => &["Status change reason"],
    }
}
