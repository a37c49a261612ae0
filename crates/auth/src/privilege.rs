use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Privilege identifier.
///
/// Privileges are opaque strings shared with the server (e.g. "admin_read").
/// Both sides must agree on the spelling; nothing here interprets the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privilege(Cow<'static, str>);

/// A set of privileges (order is irrelevant).
pub type PrivilegeSet = BTreeSet<Privilege>;

impl Privilege {
    /// Granted to every account that may sign in.
    pub const LOGON: Privilege = Privilege::from_static("logon");
    pub const ADMIN_READ: Privilege = Privilege::from_static("admin_read");
    pub const ADMIN_WRITE: Privilege = Privilege::from_static("admin_write");
    pub const GROUPS_READ: Privilege = Privilege::from_static("groups_read");
    pub const EVENT_CREATE: Privilege = Privilege::from_static("event_create");
    pub const PROJECT_WRITE: Privilege = Privilege::from_static("project_write");
    pub const PRODUCT_READ: Privilege = Privilege::from_static("product_read");
    pub const REGISTRATION_EDIT: Privilege = Privilege::from_static("registration_edit");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Privilege {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Privilege {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for Privilege {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Build a [`PrivilegeSet`] from string literals.
pub fn privilege_set<I, P>(privileges: I) -> PrivilegeSet
where
    I: IntoIterator<Item = P>,
    P: Into<Privilege>,
{
    privileges.into_iter().map(Into::into).collect()
}
