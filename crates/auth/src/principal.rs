use sessiongate_core::UserId;

use crate::{Privilege, PrivilegeSet};

/// The acting identity for authorization decisions.
///
/// Built from decoded claims; this object is intentionally decoupled from
/// storage and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub privileges: PrivilegeSet,
}

impl Principal {
    pub fn new(id: UserId, username: impl Into<String>, privileges: PrivilegeSet) -> Self {
        Self {
            id,
            username: username.into(),
            privileges,
        }
    }

    pub fn holds(&self, privilege: &Privilege) -> bool {
        self.privileges.contains(privilege)
    }

    /// Whether `record_id` (a route segment) names this principal.
    ///
    /// Segments that are not valid ids never match.
    pub fn is_record(&self, record_id: &str) -> bool {
        record_id
            .parse::<UserId>()
            .map(|id| id == self.id)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_match_requires_numeric_equality() {
        let p = Principal::new(UserId::new(5), "bob", PrivilegeSet::new());
        assert!(p.is_record("5"));
        assert!(!p.is_record("6"));
        assert!(!p.is_record("five"));
        assert!(!p.is_record(""));
    }
}
