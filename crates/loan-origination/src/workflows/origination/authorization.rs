use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::status::ApplicationStatus;
use super::transitions::can_transition;

use ApplicationStatus::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Staff,
    Admin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    /// Staff and admins record review decisions; members never do.
    pub const fn may_review(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "member" => Ok(Self::Member),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The only edges a staff member may drive on their own.
pub const STAFF_TRANSITIONS: [(ApplicationStatus, ApplicationStatus); 5] = [
    (Screening, Underwriting),
    (Screening, Rejected),
    (Screening, ToLos),
    (DocumentPreparation, AwaitingSignatures),
    (Signed, Releasing),
];

/// Role policy alone, ignoring whether the edge exists.
///
/// Admins hold a wildcard; graph legality is enforced separately by [`check_transition`].
pub fn is_authorized(role: Role, from: ApplicationStatus, to: ApplicationStatus) -> bool {
    match role {
        Role::Admin => true,
        Role::Staff => STAFF_TRANSITIONS.contains(&(from, to)),
        Role::Member => false,
    }
}

/// Why a requested transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDenial {
    NotInGraph,
    RoleNotPermitted,
}

/// Graph legality first, then role policy. A missing edge is reported as such for every role.
pub fn check_transition(
    role: Role,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), TransitionDenial> {
    if !can_transition(from, to) {
        return Err(TransitionDenial::NotInGraph);
    }
    if !is_authorized(role, from, to) {
        return Err(TransitionDenial::RoleNotPermitted);
    }
    Ok(())
}
