//! Navigation guard: runs the access policy for every transition.

use serde::Serialize;
use tokio::sync::watch;

use sessiongate_auth::{AccessExplanation, AccessPolicy, Decision, Principal};

use crate::config::ErrorRoutes;
use crate::router::normalize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    Allowed,
    RedirectUnauthenticated { to: String },
    RedirectUnauthorized { to: String },
}

impl GuardOutcome {
    /// Where the transition is sent instead, if it was denied.
    pub fn redirect(&self) -> Option<&str> {
        match self {
            GuardOutcome::Allowed => None,
            GuardOutcome::RedirectUnauthenticated { to } | GuardOutcome::RedirectUnauthorized { to } => {
                Some(to.as_str())
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allowed)
    }
}

/// `Idle → Evaluating → Resolved`, back to `Idle` once the router commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Evaluating { target: String },
    Resolved { target: String, outcome: GuardOutcome },
}

pub struct NavigationGuard {
    policy: AccessPolicy,
    routes: ErrorRoutes,
    state: watch::Sender<GuardState>,
}

impl NavigationGuard {
    pub fn new(policy: AccessPolicy, routes: ErrorRoutes) -> Self {
        let (state, _) = watch::channel(GuardState::Idle);
        Self {
            policy,
            routes,
            state,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decide the transition to `path`. Synchronous: no IO happens here.
    pub fn evaluate(&self, path: &str, principal: Option<&Principal>) -> GuardOutcome {
        self.state.send_replace(GuardState::Evaluating {
            target: path.to_string(),
        });

        let outcome = match self.policy.decide(path, principal) {
            Decision::Allow => GuardOutcome::Allowed,
            Decision::DenyUnauthenticated => GuardOutcome::RedirectUnauthenticated {
                to: self.routes.unauthorized.clone(),
            },
            Decision::DenyUnauthorized => GuardOutcome::RedirectUnauthorized {
                to: self.routes.forbidden.clone(),
            },
        };

        tracing::debug!(
            path,
            user_id = principal.map(|p| p.id.get()),
            outcome = ?outcome,
            "navigation guard decided"
        );

        self.state.send_replace(GuardState::Resolved {
            target: path.to_string(),
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Explain the decision for `path` in its canonical form.
    pub fn explain(&self, path: &str, principal: Option<&Principal>) -> AccessExplanation {
        self.policy.explain(&normalize(path), principal)
    }

    /// Navigation committed (or abandoned).
    pub fn finish(&self) {
        self.state.send_replace(GuardState::Idle);
    }

    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiongate_auth::privilege_set;
    use sessiongate_core::UserId;

    fn guard() -> NavigationGuard {
        NavigationGuard::new(AccessPolicy::standard(), ErrorRoutes::default())
    }

    #[test]
    fn anonymous_is_redirected_to_unauthorized_page() {
        let outcome = guard().evaluate("/users", None);
        assert_eq!(
            outcome,
            GuardOutcome::RedirectUnauthenticated {
                to: "/error/401".to_string()
            }
        );
    }

    #[test]
    fn missing_privilege_redirects_to_forbidden_page() {
        let p = Principal::new(UserId::new(2), "bob", privilege_set(["logon"]));
        let outcome = guard().evaluate("/users", Some(&p));
        assert_eq!(outcome.redirect(), Some("/error/403"));
        assert!(matches!(outcome, GuardOutcome::RedirectUnauthorized { .. }));
    }

    #[test]
    fn state_moves_through_resolved_back_to_idle() {
        let g = guard();
        let mut rx = g.subscribe();
        assert_eq!(g.state(), GuardState::Idle);

        g.evaluate("/welcome", None);
        assert_eq!(
            g.state(),
            GuardState::Resolved {
                target: "/welcome".to_string(),
                outcome: GuardOutcome::Allowed
            }
        );
        assert!(rx.has_changed().unwrap());

        g.finish();
        assert_eq!(*rx.borrow_and_update(), GuardState::Idle);
    }

    #[test]
    fn explanation_uses_the_canonical_path() {
        let p = Principal::new(UserId::new(2), "bob", privilege_set(["logon"]));
        let explanation = guard().explain("//users/", Some(&p));
        assert_eq!(explanation.decision, Decision::DenyUnauthorized);
    }
}
