//! Registry of every status an application can hold.
//!
//! Two vocabularies share the single `status` column: the legacy set written by the first
//! intake flow and the current pipeline set. Both stay valid forever so older records keep
//! deserializing; legality of moving between them lives in [`super::transitions`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which vocabulary a status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusGeneration {
    Legacy,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "submitted")]
    Submitted,
    #[serde(rename = "under_review")]
    UnderReview,
    #[serde(rename = "approved")]
    LegacyApproved,
    #[serde(rename = "denied")]
    Denied,
    #[serde(rename = "withdrawn")]
    Withdrawn,
    #[serde(rename = "SCREENING")]
    Screening,
    #[serde(rename = "UNDERWRITING")]
    Underwriting,
    #[serde(rename = "DECISION_PENDING")]
    DecisionPending,
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "DOCUMENT_PREPARATION")]
    DocumentPreparation,
    #[serde(rename = "AWAITING_SIGNATURES")]
    AwaitingSignatures,
    #[serde(rename = "SIGNED")]
    Signed,
    #[serde(rename = "RELEASING")]
    Releasing,
    #[serde(rename = "DISBURSED")]
    Disbursed,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "TO_LOS")]
    ToLos,
}

impl ApplicationStatus {
    pub const ALL: [Self; 18] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::LegacyApproved,
        Self::Denied,
        Self::Withdrawn,
        Self::Screening,
        Self::Underwriting,
        Self::DecisionPending,
        Self::Approved,
        Self::Rejected,
        Self::DocumentPreparation,
        Self::AwaitingSignatures,
        Self::Signed,
        Self::Releasing,
        Self::Disbursed,
        Self::Completed,
        Self::ToLos,
    ];

    /// Stored and wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::LegacyApproved => "approved",
            Self::Denied => "denied",
            Self::Withdrawn => "withdrawn",
            Self::Screening => "SCREENING",
            Self::Underwriting => "UNDERWRITING",
            Self::DecisionPending => "DECISION_PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::DocumentPreparation => "DOCUMENT_PREPARATION",
            Self::AwaitingSignatures => "AWAITING_SIGNATURES",
            Self::Signed => "SIGNED",
            Self::Releasing => "RELEASING",
            Self::Disbursed => "DISBURSED",
            Self::Completed => "COMPLETED",
            Self::ToLos => "TO_LOS",
        }
    }

    pub const fn generation(self) -> StatusGeneration {
        match self {
            Self::Draft
            | Self::Submitted
            | Self::UnderReview
            | Self::LegacyApproved
            | Self::Denied
            | Self::Withdrawn => StatusGeneration::Legacy,
            _ => StatusGeneration::Current,
        }
    }

    pub const fn is_legacy(self) -> bool {
        matches!(self.generation(), StatusGeneration::Legacy)
    }

    /// Title shown on badges and timelines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::UnderReview => "Under Review",
            Self::LegacyApproved => "Approved",
            Self::Denied => "Denied",
            Self::Withdrawn => "Withdrawn",
            Self::Screening => "Initial Review",
            Self::Underwriting => "Credit Analysis",
            Self::DecisionPending => "Awaiting Decision",
            Self::Approved => "Loan Approved",
            Self::Rejected => "Application Declined",
            Self::DocumentPreparation => "Preparing Documents",
            Self::AwaitingSignatures => "Signature Required",
            Self::Signed => "Documents Signed",
            Self::Releasing => "Releasing Funds",
            Self::Disbursed => "Funds Sent",
            Self::Completed => "Loan Complete",
            Self::ToLos => "Specialized Review",
        }
    }

    /// Applicant-facing explanation of the status.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Screening => {
                "Your application is being reviewed for initial eligibility and completeness."
            }
            Self::Underwriting => {
                "We are analyzing your credit profile and assessing the loan risk."
            }
            Self::DecisionPending => {
                "Your application is awaiting final approval from our lending team."
            }
            Self::Approved => {
                "Congratulations! Your loan has been approved. Documents will be prepared shortly."
            }
            Self::Rejected => "Unfortunately, we cannot approve your loan at this time.",
            Self::DocumentPreparation => "We are preparing your loan documents for signature.",
            Self::AwaitingSignatures => "Your documents are ready. Please review and sign them.",
            Self::Signed => "Documents received! We are preparing to release your funds.",
            Self::Releasing => {
                "Final compliance checks are being completed before disbursement."
            }
            Self::Disbursed => "Your loan funds have been sent to your account.",
            Self::Completed => "Your loan has been successfully completed.",
            Self::ToLos => {
                "Your application requires specialized review and has been routed to our loan origination team."
            }
            _ => "Processing your application...",
        }
    }

    pub const fn badge(self) -> BadgeTone {
        match self {
            Self::Screening => BadgeTone::Purple,
            Self::Underwriting => BadgeTone::Indigo,
            Self::DecisionPending | Self::UnderReview => BadgeTone::Yellow,
            Self::Approved | Self::Completed | Self::LegacyApproved => BadgeTone::Green,
            Self::Rejected | Self::Denied => BadgeTone::Red,
            Self::DocumentPreparation | Self::Submitted => BadgeTone::Blue,
            Self::AwaitingSignatures => BadgeTone::Orange,
            Self::Signed => BadgeTone::Teal,
            Self::Releasing => BadgeTone::Cyan,
            Self::Disbursed => BadgeTone::Emerald,
            Self::ToLos | Self::Draft | Self::Withdrawn => BadgeTone::Gray,
        }
    }

    /// No further transition exists out of this status.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Completed | Self::ToLos | Self::Denied | Self::Withdrawn
        )
    }

    /// Routed out of the standard pipeline; may carry an external reference number.
    pub const fn hands_off_externally(self) -> bool {
        matches!(self, Self::ToLos)
    }

    /// Position on the ten-step pipeline. Legacy statuses land on their closest step.
    pub const fn pipeline_position(self) -> Option<usize> {
        match self {
            Self::Draft | Self::Submitted | Self::Screening => Some(0),
            Self::Underwriting => Some(1),
            Self::UnderReview | Self::DecisionPending => Some(2),
            Self::LegacyApproved | Self::Approved => Some(3),
            Self::DocumentPreparation => Some(4),
            Self::AwaitingSignatures => Some(5),
            Self::Signed => Some(6),
            Self::Releasing => Some(7),
            Self::Disbursed => Some(8),
            Self::Completed => Some(9),
            Self::Rejected | Self::ToLos | Self::Denied | Self::Withdrawn => None,
        }
    }

    /// Display-only progress. Never consult this for authorization.
    pub const fn progress_percentage(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted | Self::Screening => 10,
            Self::ToLos => 15,
            Self::Underwriting => 20,
            Self::UnderReview | Self::DecisionPending => 30,
            Self::LegacyApproved | Self::Approved => 40,
            Self::DocumentPreparation => 50,
            Self::AwaitingSignatures => 60,
            Self::Signed => 70,
            Self::Releasing => 80,
            Self::Disbursed => 90,
            Self::Completed | Self::Rejected | Self::Denied | Self::Withdrawn => 100,
        }
    }

    pub const fn stage(self) -> Option<PipelineStage> {
        match self {
            Self::Draft | Self::Submitted | Self::Screening => Some(PipelineStage::Screening),
            Self::Underwriting => Some(PipelineStage::Underwriting),
            Self::UnderReview | Self::DecisionPending => Some(PipelineStage::Decision),
            Self::LegacyApproved | Self::Approved | Self::DocumentPreparation => {
                Some(PipelineStage::Documents)
            }
            Self::AwaitingSignatures => Some(PipelineStage::Signatures),
            Self::Signed | Self::Releasing => Some(PipelineStage::Releasing),
            Self::Disbursed => Some(PipelineStage::Disbursed),
            Self::Completed => Some(PipelineStage::Completed),
            Self::Rejected | Self::ToLos | Self::Denied | Self::Withdrawn => None,
        }
    }

    pub const fn estimated_completion(self) -> &'static str {
        match self {
            Self::Screening => "5-7 business days",
            Self::Underwriting => "3-5 business days",
            Self::DecisionPending => "1-2 business days",
            Self::Approved | Self::Signed => "1 business day",
            Self::DocumentPreparation | Self::Releasing | Self::Disbursed => "Same day",
            Self::AwaitingSignatures => "Waiting for your action",
            Self::Completed => "Complete",
            Self::ToLos => "7-10 business days",
            Self::Rejected => "N/A",
            _ => "TBD",
        }
    }

    pub const fn next_steps(self) -> &'static [&'static str] {
        match self {
            Self::Screening => &[
                "We verify your basic eligibility",
                "Credit check will be performed",
                "You may be asked for additional documents",
            ],
            Self::Underwriting => &[
                "Detailed credit analysis in progress",
                "Income verification",
                "Decision expected within 24-48 hours",
            ],
            Self::DecisionPending => &[
                "Final review by lending committee",
                "Decision will be made shortly",
                "You will be notified via email",
            ],
            Self::Approved => &[
                "Loan documents will be generated",
                "You will receive an email to sign documents",
                "Funds will be disbursed after signing",
            ],
            Self::DocumentPreparation => &[
                "Documents are being prepared",
                "You will receive signing instructions soon",
                "Review documents carefully before signing",
            ],
            Self::AwaitingSignatures => &[
                "Review all documents carefully",
                "Complete electronic signature",
                "Contact us if you have questions",
            ],
            Self::Signed => &[
                "Final compliance review",
                "Disbursement will be initiated",
                "Funds will arrive in your account soon",
            ],
            Self::Releasing => &[
                "Final checks in progress",
                "Disbursement being processed",
                "You will receive confirmation shortly",
            ],
            Self::Disbursed => &[
                "Check your account for funds",
                "Confirm receipt of funds",
                "First payment information will follow",
            ],
            Self::Completed => &[
                "Loan successfully completed",
                "All documents are available in your portal",
                "Thank you for your business",
            ],
            Self::ToLos => &[
                "Specialized team reviewing your application",
                "Additional time may be required",
                "We will contact you with updates",
            ],
            Self::Rejected => &[
                "Review the decision letter for details",
                "You may reapply after addressing concerns",
                "Contact us to discuss options",
            ],
            _ => &["Your application is being processed"],
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored or submitted status string is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

/// Badge colour family. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Purple,
    Indigo,
    Yellow,
    Green,
    Red,
    Blue,
    Orange,
    Teal,
    Cyan,
    Emerald,
    Gray,
}

impl BadgeTone {
    pub const fn css_classes(self) -> &'static str {
        match self {
            Self::Purple => "bg-purple-100 text-purple-800",
            Self::Indigo => "bg-indigo-100 text-indigo-800",
            Self::Yellow => "bg-yellow-100 text-yellow-800",
            Self::Green => "bg-green-100 text-green-800",
            Self::Red => "bg-red-100 text-red-800",
            Self::Blue => "bg-blue-100 text-blue-800",
            Self::Orange => "bg-orange-100 text-orange-800",
            Self::Teal => "bg-teal-100 text-teal-800",
            Self::Cyan => "bg-cyan-100 text-cyan-800",
            Self::Emerald => "bg-emerald-100 text-emerald-800",
            Self::Gray => "bg-gray-100 text-gray-800",
        }
    }
}

/// Coarse grouping of the pipeline used by progress visualizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Screening,
    Underwriting,
    Decision,
    Documents,
    Signatures,
    Releasing,
    Disbursed,
    Completed,
}

impl PipelineStage {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Screening,
            Self::Underwriting,
            Self::Decision,
            Self::Documents,
            Self::Signatures,
            Self::Releasing,
            Self::Disbursed,
            Self::Completed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Screening => "Screening",
            Self::Underwriting => "Underwriting",
            Self::Decision => "Decision",
            Self::Documents => "Documents",
            Self::Signatures => "Signatures",
            Self::Releasing => "Releasing",
            Self::Disbursed => "Disbursed",
            Self::Completed => "Completed",
        }
    }

    fn index(self) -> usize {
        Self::ordered()
            .iter()
            .position(|stage| *stage == self)
            .unwrap_or_default()
    }
}

/// Where a step or stage sits relative to the application's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Current,
    Pending,
}

/// Relative state of `stage` for an application in `current`.
///
/// Statuses outside the staged pipeline (REJECTED, TO_LOS, denied, withdrawn) report every
/// stage as pending.
pub fn stage_state(stage: PipelineStage, current: ApplicationStatus) -> StepState {
    let Some(current_stage) = current.stage() else {
        return StepState::Pending;
    };

    match stage.index().cmp(&current_stage.index()) {
        std::cmp::Ordering::Less => StepState::Completed,
        std::cmp::Ordering::Equal => StepState::Current,
        std::cmp::Ordering::Greater => StepState::Pending,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStep {
    pub status: ApplicationStatus,
    pub label: &'static str,
    pub state: StepState,
}

const PIPELINE_STEPS: [(ApplicationStatus, &str); 10] = [
    (ApplicationStatus::Screening, "Screening"),
    (ApplicationStatus::Underwriting, "Underwriting"),
    (ApplicationStatus::DecisionPending, "Decision"),
    (ApplicationStatus::Approved, "Approved"),
    (ApplicationStatus::DocumentPreparation, "Documents"),
    (ApplicationStatus::AwaitingSignatures, "Sign"),
    (ApplicationStatus::Signed, "Signed"),
    (ApplicationStatus::Releasing, "Releasing"),
    (ApplicationStatus::Disbursed, "Disbursed"),
    (ApplicationStatus::Completed, "Complete"),
];

/// The ten-step timeline with each step marked against `current`.
pub fn pipeline_steps(current: ApplicationStatus) -> Vec<PipelineStep> {
    let position = current.pipeline_position();

    PIPELINE_STEPS
        .iter()
        .enumerate()
        .map(|(index, (status, label))| {
            let state = match position {
                Some(current) if index < current => StepState::Completed,
                Some(current) if index == current => StepState::Current,
                _ => StepState::Pending,
            };
            PipelineStep {
                status: *status,
                label,
                state,
            }
        })
        .collect()
}
