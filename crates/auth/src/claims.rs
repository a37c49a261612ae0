use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use sessiongate_core::UserId;

use crate::{Principal, PrivilegeSet};

/// Decoded token payload (identity, privileges, timestamps).
///
/// Claims are derived from a [`Token`](crate::Token) and never mutated; a new
/// token always yields a fresh value. Timestamps are seconds since the epoch,
/// exactly as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject string as issued by the server.
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Subject identifier: the user's record id, used for self-access checks.
    pub id: UserId,

    /// Display name.
    pub username: String,

    /// Privileges granted through the user's groups.
    #[serde(default)]
    pub privileges: PrivilegeSet,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// `exp < now`, compared at second granularity.
    ///
    /// A token whose `exp` equals the current second is still usable.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// The acting identity used for authorization decisions.
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone(), self.privileges.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege_set;

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "User Details".to_string(),
            iss: "portal".to_string(),
            id: UserId::new(3),
            username: "alice".to_string(),
            privileges: privilege_set(["logon"]),
            iat: exp - 86_400,
            exp,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn expiry_is_strictly_less_than_now() {
        let c = claims(1_000);
        assert!(!c.is_expired(at(999)));
        assert!(!c.is_expired(at(1_000)));
        assert!(c.is_expired(at(1_001)));
    }

    #[test]
    fn expiry_ignores_sub_second_precision() {
        let c = claims(1_000);
        let almost = at(1_000) + chrono::Duration::milliseconds(999);
        assert!(!c.is_expired(almost));
    }

    #[test]
    fn principal_carries_identity_and_privileges() {
        let p = claims(1_000).principal();
        assert_eq!(p.id, UserId::new(3));
        assert_eq!(p.username, "alice");
        assert!(p.privileges.contains(&crate::Privilege::LOGON));
    }

    #[test]
    fn missing_privileges_claim_defaults_to_empty() {
        let json = r#"{"sub":"s","iss":"i","id":1,"username":"u","iat":1,"exp":2}"#;
        let c: Claims = serde_json::from_str(json).unwrap();
        assert!(c.privileges.is_empty());
    }
}
