//! Route → required-privilege table and the matching rules.
//!
//! Keys of the main table are matched by **exact path** only. Record-scoped
//! resources (`/users/:id`, ...) live in a separate list of [`RecordRule`]s,
//! matched as `<collection>/<one segment>`.

use std::collections::HashMap;

use crate::{Principal, Privilege, PrivilegeSet, privilege_set};

/// ANY-match privilege test.
///
/// - `None` or an empty set (no restriction declared) → `true`.
/// - Otherwise `true` iff `required ∩ held ≠ ∅`: one required privilege is
///   enough.
pub fn has_privilege(required: Option<&PrivilegeSet>, held: &PrivilegeSet) -> bool {
    match required {
        None => true,
        Some(required) => required.is_empty() || required.iter().any(|p| held.contains(p)),
    }
}

/// Per-record rule: access when the acting identity *is* the record, OR when
/// it holds one of `privileges`. Never both required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRule {
    /// Collection path, e.g. `/users`. Records are `/users/<id>`.
    pub collection: String,
    pub privileges: PrivilegeSet,
    /// Grant access when the record id equals the principal's id.
    pub allow_self: bool,
}

impl RecordRule {
    pub fn self_or(collection: impl Into<String>, privileges: PrivilegeSet) -> Self {
        Self {
            collection: collection.into(),
            privileges,
            allow_self: true,
        }
    }

    /// Record id if `path` is `<collection>/<segment>`.
    fn record_id<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = path.strip_prefix(self.collection.as_str())?;
        let id = rest.strip_prefix('/')?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(id)
    }
}

/// Self-or-privileged check for a record route.
///
/// `principal` is `None` for anonymous callers, who can never pass.
pub fn has_access_or_self(rule: &RecordRule, principal: Option<&Principal>, record_id: &str) -> bool {
    let Some(principal) = principal else {
        return false;
    };
    if rule.allow_self && principal.is_record(record_id) {
        return true;
    }
    has_privilege(Some(&rule.privileges), &principal.privileges)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeTable {
    exact: HashMap<String, PrivilegeSet>,
    records: Vec<RecordRule>,
}

impl PrivilegeTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, path: impl Into<String>, privileges: PrivilegeSet) -> Self {
        self.exact.insert(path.into(), privileges);
        self
    }

    pub fn with_record(mut self, rule: RecordRule) -> Self {
        self.records.push(rule);
        self
    }

    /// Exact-match lookup; unmatched paths carry no restriction from this table.
    pub fn required_privileges(&self, path: &str) -> Option<&PrivilegeSet> {
        self.exact.get(path)
    }

    /// First record rule matching `path`, with the record id taken from it.
    pub fn record_rule<'p>(&self, path: &'p str) -> Option<(&RecordRule, &'p str)> {
        self.records
            .iter()
            .find_map(|rule| rule.record_id(path).map(|id| (rule, id)))
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, &PrivilegeSet)> {
        self.exact.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn records(&self) -> &[RecordRule] {
        &self.records
    }

    /// The table agreed with the server's privilege vocabulary.
    pub fn standard() -> Self {
        let logon = || privilege_set([Privilege::LOGON]);

        Self::empty()
            .with_route("/users", privilege_set([Privilege::ADMIN_READ]))
            .with_route("/groups", privilege_set([Privilege::GROUPS_READ]))
            .with_route("/events", logon())
            .with_route("/projects", logon())
            .with_route(
                "/products",
                privilege_set([Privilege::ADMIN_READ, Privilege::PRODUCT_READ]),
            )
            .with_route("/profile", logon())
            .with_route("/profile/edit", logon())
            .with_route("/dashboard", logon())
            .with_route("/productslist", logon())
            .with_route("/home", logon())
            .with_route("/my-requests", logon())
            .with_route("/project-requests", privilege_set([Privilege::PROJECT_WRITE]))
            .with_route("/registrations", privilege_set([Privilege::REGISTRATION_EDIT]))
            .with_record(RecordRule::self_or(
                "/users",
                privilege_set([Privilege::ADMIN_WRITE]),
            ))
            .with_record(RecordRule::self_or(
                "/projects",
                privilege_set([Privilege::PROJECT_WRITE]),
            ))
    }
}
