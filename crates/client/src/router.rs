//! Route table and the serialized navigation loop.
//!
//! Every navigation runs the session expiry check, resolves static redirects,
//! asks the [`NavigationGuard`], follows its redirect and only then commits a
//! [`Location`]. Navigations are serialized; a navigation overtaken by a newer
//! one commits nothing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, watch};

use crate::guard::{GuardOutcome, NavigationGuard};
use crate::navigation::{NavigationBatch, NavigationReceiver};
use crate::session::SessionStore;

/// Redirect hops followed before a navigation is abandoned.
const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Renders a view at this path.
    View,
    Redirect(&'static str),
    /// `/home` with a session, `/welcome` without.
    HomeOrWelcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    /// Literal segments, with `:name` capturing exactly one segment.
    pub pattern: &'static str,
    pub name: &'static str,
    pub target: RouteTarget,
}

impl RouteDef {
    const fn view(pattern: &'static str, name: &'static str) -> Self {
        Self {
            pattern,
            name,
            target: RouteTarget::View,
        }
    }

    fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let pattern: Vec<&str> = segments(self.pattern).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (expected, got) in pattern.iter().zip(actual.iter()) {
            match expected.strip_prefix(':') {
                Some(name) => {
                    params.insert(name.to_string(), got.to_string());
                }
                None if expected == got => {}
                None => return None,
            }
        }
        Some(params)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of `path`: query and fragment stripped, runs of `/`
/// collapsed, no trailing slash, one leading slash.
///
/// The guard and the committed location both see this form, so a path
/// reaches the privilege table exactly as the route table matched it.
pub fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let joined = segments(path.trim()).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
    /// Destination for paths no route matches.
    fallback: &'static str,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDef>, fallback: &'static str) -> Self {
        Self { routes, fallback }
    }

    /// The client's views.
    pub fn standard() -> Self {
        let routes = vec![
            RouteDef {
                pattern: "/",
                name: "root",
                target: RouteTarget::HomeOrWelcome,
            },
            RouteDef::view("/home", "home"),
            RouteDef::view("/welcome", "welcome"),
            RouteDef::view("/register", "register"),
            RouteDef::view("/login", "login"),
            RouteDef::view("/registrations", "registrations"),
            RouteDef::view("/users", "users"),
            RouteDef::view("/users/:id", "user"),
            RouteDef::view("/groups", "groups"),
            RouteDef::view("/groups/:id", "group"),
            RouteDef::view("/profile", "profile"),
            RouteDef::view("/profile/edit", "profile-edit"),
            RouteDef::view("/events", "events"),
            RouteDef::view("/events/:id", "event"),
            RouteDef::view("/products", "products"),
            RouteDef::view("/products/edit", "product-edit"),
            RouteDef::view("/projects", "projects"),
            RouteDef::view("/projects/:id", "project"),
            RouteDef::view("/dashboard", "dashboard"),
            RouteDef::view("/my-requests", "my-requests"),
            RouteDef::view("/project-requests", "project-requests"),
            RouteDef {
                pattern: "/error",
                name: "error",
                target: RouteTarget::Redirect("/error/404"),
            },
            RouteDef::view("/error/404", "not-found"),
            RouteDef::view("/error/403", "forbidden"),
            RouteDef::view("/error/401", "unauthorized"),
        ];
        Self::new(routes, "/error/404")
    }

    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    pub fn fallback(&self) -> &'static str {
        self.fallback
    }

    /// First route matching the normalized `path`, with captured params.
    pub fn resolve(&self, path: &str) -> Option<(&RouteDef, BTreeMap<String, String>)> {
        self.routes
            .iter()
            .find_map(|route| route.matches(path).map(|params| (route, params)))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// The committed location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    pub name: String,
    pub params: BTreeMap<String, String>,
    /// Bumped on every reload so views recompute session-dependent UI.
    pub epoch: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("navigation to '{path}' did not settle after {hops} redirects")]
    RedirectLoop { path: String, hops: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Completed {
        requested: String,
        /// Guard verdict on the first guarded route of this navigation.
        outcome: GuardOutcome,
        location: Location,
    },
    /// Overtaken by a newer navigation; nothing was committed.
    Cancelled { requested: String },
}

impl Navigation {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Navigation::Completed { location, .. } => Some(location),
            Navigation::Cancelled { .. } => None,
        }
    }
}

pub struct Router {
    routes: RouteTable,
    guard: NavigationGuard,
    session: SessionStore,
    location: watch::Sender<Location>,
    generation: AtomicU64,
    epoch: AtomicU64,
    serial: Mutex<()>,
}

impl Router {
    pub fn new(routes: RouteTable, guard: NavigationGuard, session: SessionStore) -> Self {
        let (location, _) = watch::channel(Location::default());
        Self {
            routes,
            guard,
            session,
            location,
            generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            serial: Mutex::new(()),
        }
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn current(&self) -> Location {
        self.location.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.location.subscribe()
    }

    fn superseded(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != ticket
    }

    /// Navigate to `path`.
    pub async fn navigate(&self, path: &str) -> Result<Navigation, RouterError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let requested = path.to_string();
        let _serial = self.serial.lock().await;

        if self.superseded(ticket) {
            tracing::debug!(path = %requested, "navigation superseded before it started");
            return Ok(Navigation::Cancelled { requested });
        }

        self.session.check_and_maybe_expire().await;
        let principal = self.session.principal().await;

        let mut current = normalize(path);
        let mut verdict = None;

        for _ in 0..MAX_REDIRECTS {
            let Some((route, params)) = self.routes.resolve(&current) else {
                tracing::debug!(path = %current, "no route matched");
                current = self.routes.fallback().to_string();
                continue;
            };

            match route.target {
                RouteTarget::Redirect(to) => {
                    current = to.to_string();
                    continue;
                }
                RouteTarget::HomeOrWelcome => {
                    current = if principal.is_some() { "/home" } else { "/welcome" }.to_string();
                    continue;
                }
                RouteTarget::View => {}
            }

            let outcome = self.guard.evaluate(&current, principal.as_ref());
            if let Some(to) = outcome.redirect() {
                current = to.to_string();
                verdict.get_or_insert(outcome);
                continue;
            }
            let outcome = verdict.unwrap_or(outcome);

            if self.superseded(ticket) {
                self.guard.finish();
                tracing::debug!(path = %requested, "navigation superseded; not committed");
                return Ok(Navigation::Cancelled { requested });
            }

            let location = Location {
                path: current,
                name: route.name.to_string(),
                params,
                epoch: self.epoch.load(Ordering::SeqCst),
            };
            self.location.send_replace(location.clone());
            self.guard.finish();

            tracing::info!(requested = %requested, path = %location.path, "navigated");
            return Ok(Navigation::Completed {
                requested,
                outcome,
                location,
            });
        }

        self.guard.finish();
        tracing::warn!(path = %requested, "navigation abandoned: too many redirects");
        Err(RouterError::RedirectLoop {
            path: requested,
            hops: MAX_REDIRECTS,
        })
    }

    /// Re-evaluate the current location from a clean slate.
    pub async fn reload(&self) -> Result<Navigation, RouterError> {
        self.guard.finish();
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.current().path;
        let target = if current.is_empty() { "/".to_string() } else { current };
        tracing::debug!(epoch, path = %target, "reloading");
        self.navigate(&target).await
    }

    /// Perform one coalesced batch: the push first, then the reload.
    ///
    /// The reload runs even when the push fails; the first error is returned
    /// afterwards.
    pub async fn apply(&self, batch: NavigationBatch) -> Result<Option<Navigation>, RouterError> {
        let mut last = None;
        let mut failure = None;
        if let Some(target) = batch.target {
            match self.navigate(&target).await {
                Ok(nav) => last = Some(nav),
                Err(e) => failure = Some(e),
            }
        }
        if batch.reload {
            match self.reload().await {
                Ok(nav) => last = Some(nav),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(last),
        }
    }

    /// Serve navigation requests until every sender is gone.
    pub async fn run(&self, mut receiver: NavigationReceiver) {
        while let Some(batch) = receiver.next_batch().await {
            if let Err(e) = self.apply(batch).await {
                tracing::warn!(error = %e, "requested navigation failed");
            }
        }
        tracing::debug!("navigation channel closed");
    }
}
