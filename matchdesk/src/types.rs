//! Id aliases and the vocabulary of the permission table.
//!
//! A permission is a [`Resource`] plus an [`Operation`]. `*All` operations reach every row,
//! `*Own` operations only rows whose lead is assigned to the caller; [`Scope`] is how the
//! repositories see that difference. `Review` is deciding a payment request.
//!
//! Which role holds which permission is decided in [`crate::auth::permissions`].

use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub type UserId = Uuid;
pub type TrafficId = Uuid;
pub type PaymentId = Uuid;
pub type SettingId = Uuid;

/// First 8 hex digits of an id, for log fields.
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub enum CurrentKeyword {
    #[serde(rename = "current")]
    Current,
}

/// Lets `/users/current` and `/users/{id}` hit the same handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdOrCurrent {
    Current(CurrentKeyword),
    Id(UserId),
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to records assigned to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
    /// Accept or cancel a pending payment request
    Review,
}

impl Operation {
    /// The `Own` counterpart of an `All` operation, if there is one.
    pub fn own(self) -> Option<Operation> {
        match self {
            Operation::CreateAll => Some(Operation::CreateOwn),
            Operation::ReadAll => Some(Operation::ReadOwn),
            Operation::UpdateAll => Some(Operation::UpdateOwn),
            Operation::DeleteAll => Some(Operation::DeleteOwn),
            _ => None,
        }
    }
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Traffic,
    Payments,
    PaidClients,
    Settings,
    Dashboard,
}

/// Row-level visibility for role-scoped queries. Repositories turn this into a predicate on
/// `traffic.assigned_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    AssignedTo(UserId),
}

impl Scope {
    pub fn assignee(self) -> Option<UserId> {
        match self {
            Scope::All => None,
            Scope::AssignedTo(id) => Some(id),
        }
    }
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Logical combinators
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
            Operation::Review => write!(f, "Review"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Users => write!(f, "user accounts"),
            Resource::Traffic => write!(f, "traffic"),
            Resource::Payments => write!(f, "payments"),
            Resource::PaidClients => write!(f, "paid clients"),
            Resource::Settings => write!(f, "settings"),
            Resource::Dashboard => write!(f, "dashboard statistics"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_user_id_or_current_parses_both_forms() {
        let current: UserIdOrCurrent = serde_json::from_str("\"current\"").unwrap();
        assert!(matches!(current, UserIdOrCurrent::Current(_)));

        let id = Uuid::new_v4();
        let parsed: UserIdOrCurrent = serde_json::from_str(&format!("\"{id}\"")).unwrap();
        assert!(matches!(parsed, UserIdOrCurrent::Id(parsed_id) if parsed_id == id));
    }

    #[test]
    fn test_own_counterparts() {
        assert_eq!(Operation::ReadAll.own(), Some(Operation::ReadOwn));
        assert_eq!(Operation::DeleteAll.own(), Some(Operation::DeleteOwn));
        assert_eq!(Operation::Review.own(), None);
        assert_eq!(Operation::ReadOwn.own(), None);
    }
}
