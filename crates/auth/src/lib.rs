//! `sessiongate-auth`: pure token/privilege/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod principal;
pub mod privilege;
pub mod table;
pub mod token;

pub use authorize::{AccessExplanation, AccessPolicy, Decision, PublicPaths, RouteRequirement};
pub use claims::Claims;
pub use principal::Principal;
pub use privilege::{Privilege, PrivilegeSet, privilege_set};
pub use table::{PrivilegeTable, RecordRule, has_access_or_self, has_privilege};
pub use token::{MalformedTokenError, Token};
