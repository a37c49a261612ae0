use std::collections::HashSet;

use serde::Serialize;

use crate::table::{has_access_or_self, has_privilege};
use crate::{Principal, PrivilegeSet, PrivilegeTable};

/// Paths reachable without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPaths {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl PublicPaths {
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.exact.contains(path) || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new(["/", "/login", "/welcome", "/register"], ["/error/"])
    }
}

/// What a route requires, as one tagged value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteRequirement {
    /// Public route, no session needed.
    NoAuth,
    /// Any signed-in session.
    RequireAuth,
    /// At least one of the privileges.
    RequirePrivilegeAny { privileges: PrivilegeSet },
    /// The record is the acting identity, or at least one of the privileges.
    RequirePrivilegeAnyOrSelf {
        privileges: PrivilegeSet,
        record_id: String,
    },
}

/// Outcome of one authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    DenyUnauthenticated,
    DenyUnauthorized,
}

/// Public paths + privilege table: the complete navigation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub public: PublicPaths,
    pub table: PrivilegeTable,
}

impl AccessPolicy {
    pub fn new(public: PublicPaths, table: PrivilegeTable) -> Self {
        Self { public, table }
    }

    /// The standard public paths and privilege table.
    pub fn standard() -> Self {
        Self::new(PublicPaths::default(), PrivilegeTable::standard())
    }

    pub fn auth_required(&self, path: &str) -> bool {
        !self.public.contains(path)
    }

    /// Resolve the tagged requirement for `path`.
    ///
    /// Table entries win over the public/auth split; privilege variants imply
    /// an authenticated identity.
    pub fn requirement(&self, path: &str) -> RouteRequirement {
        if let Some(privileges) = self.table.required_privileges(path) {
            return RouteRequirement::RequirePrivilegeAny {
                privileges: privileges.clone(),
            };
        }
        if let Some((rule, record_id)) = self.table.record_rule(path) {
            return if rule.allow_self {
                RouteRequirement::RequirePrivilegeAnyOrSelf {
                    privileges: rule.privileges.clone(),
                    record_id: record_id.to_string(),
                }
            } else {
                RouteRequirement::RequirePrivilegeAny {
                    privileges: rule.privileges.clone(),
                }
            };
        }
        if self.auth_required(path) {
            RouteRequirement::RequireAuth
        } else {
            RouteRequirement::NoAuth
        }
    }

    /// Decide a transition to `path`.
    ///
    /// Order matters and is fixed:
    /// 1. authentication (non-public path without a session),
    /// 2. exact table entry (ANY-match),
    /// 3. record rule (self OR privileged).
    ///
    /// - No IO
    /// - No panics
    pub fn decide(&self, path: &str, principal: Option<&Principal>) -> Decision {
        if self.auth_required(path) && principal.is_none() {
            return Decision::DenyUnauthenticated;
        }

        let empty = PrivilegeSet::new();
        let held = principal.map(|p| &p.privileges).unwrap_or(&empty);

        if let Some(required) = self.table.required_privileges(path) {
            if !has_privilege(Some(required), held) {
                return Decision::DenyUnauthorized;
            }
        }

        if let Some((rule, record_id)) = self.table.record_rule(path) {
            if !has_access_or_self(rule, principal, record_id) {
                return Decision::DenyUnauthorized;
            }
        }

        Decision::Allow
    }

    /// Explain why a transition would be allowed or denied.
    pub fn explain(&self, path: &str, principal: Option<&Principal>) -> AccessExplanation {
        let requirement = self.requirement(path);
        let decision = self.decide(path, principal);

        let reason = match (&decision, &requirement) {
            (Decision::DenyUnauthenticated, _) => {
                format!("'{}' is not public and there is no session", path)
            }
            (Decision::DenyUnauthorized, RouteRequirement::RequirePrivilegeAnyOrSelf { record_id, privileges }) => {
                format!(
                    "record '{}' is not the acting user and none of {:?} is held",
                    record_id,
                    names(privileges)
                )
            }
            (Decision::DenyUnauthorized, RouteRequirement::RequirePrivilegeAny { privileges }) => {
                format!("none of {:?} is held", names(privileges))
            }
            (Decision::DenyUnauthorized, _) => "privilege check failed".to_string(),
            (Decision::Allow, RouteRequirement::NoAuth) => "public route".to_string(),
            (Decision::Allow, RouteRequirement::RequireAuth) => "signed-in session".to_string(),
            (Decision::Allow, RouteRequirement::RequirePrivilegeAny { .. }) => {
                "holds a required privilege".to_string()
            }
            (Decision::Allow, RouteRequirement::RequirePrivilegeAnyOrSelf { record_id, .. }) => {
                match principal {
                    Some(p) if p.is_record(record_id) => "record is the acting user".to_string(),
                    _ => "holds a required privilege".to_string(),
                }
            }
        };

        AccessExplanation {
            path: path.to_string(),
            requirement,
            decision,
            reason,
            principal: principal.map(|p| PrincipalState {
                id: p.id.get(),
                username: p.username.clone(),
                privileges: names(&p.privileges),
            }),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

fn names(set: &PrivilegeSet) -> Vec<String> {
    set.iter().map(|p| p.as_str().to_string()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of a navigation decision.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub path: String,
    pub requirement: RouteRequirement,
    pub decision: Decision,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// `None` for anonymous callers.
    pub principal: Option<PrincipalState>,
}

/// Snapshot of the principal that was checked.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub id: i64,
    pub username: String,
    pub privileges: Vec<String>,
}
