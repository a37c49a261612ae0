use std::sync::Arc;

use sessiongate_auth::AccessPolicy;
use sessiongate_core::{Clock, SystemClock};

use crate::config::ClientConfig;
use crate::cookie::{CookieStore, FileCookieStore};
use crate::gateway::{Gateway, GatewayError, Transport};
use crate::guard::NavigationGuard;
use crate::navigation::{NavigationQueue, NavigationReceiver, navigation_channel};
use crate::router::{Navigation, RouteTable, Router, RouterError};
use crate::session::SessionStore;

/// Fully wired client: gateway, session store and router sharing one
/// navigation channel.
pub struct ClientApp {
    pub config: ClientConfig,
    pub session: SessionStore,
    pub router: Arc<Router>,
    navigator: NavigationQueue,
    receiver: Option<NavigationReceiver>,
}

impl ClientApp {
    /// Production wiring: `reqwest` transport, file-backed cookie, system clock.
    pub fn from_config(config: ClientConfig) -> Result<Self, GatewayError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cookies = Arc::new(FileCookieStore::new(config.cookie_file.clone(), clock.clone()));
        let (navigator, receiver) = navigation_channel();
        let gateway = Gateway::from_config(&config, Arc::new(navigator.clone()))?;
        Ok(Self::assemble(config, gateway, cookies, clock, navigator, receiver))
    }

    /// Wiring over an arbitrary transport, cookie jar and clock.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (navigator, receiver) = navigation_channel();
        let gateway = Gateway::new(
            transport,
            Arc::new(navigator.clone()),
            config.error_routes.clone(),
        );
        Self::assemble(config, gateway, cookies, clock, navigator, receiver)
    }

    fn assemble(
        config: ClientConfig,
        gateway: Gateway,
        cookies: Arc<dyn CookieStore>,
        clock: Arc<dyn Clock>,
        navigator: NavigationQueue,
        receiver: NavigationReceiver,
    ) -> Self {
        let session = SessionStore::new(
            gateway,
            cookies,
            Arc::new(navigator.clone()),
            clock,
            config.cookie.clone(),
        );
        let guard = NavigationGuard::new(AccessPolicy::standard(), config.error_routes.clone());
        let router = Arc::new(Router::new(RouteTable::standard(), guard, session.clone()));

        Self {
            config,
            session,
            router,
            navigator,
            receiver: Some(receiver),
        }
    }

    pub fn navigator(&self) -> &NavigationQueue {
        &self.navigator
    }

    /// Page load: restore the session, then navigate to `initial`.
    pub async fn start(&mut self, initial: &str) -> Result<Navigation, RouterError> {
        self.session.load().await;
        let nav = self.router.navigate(initial).await?;
        self.settle().await?;
        Ok(nav)
    }

    /// Perform navigations requested so far, until none are pending.
    ///
    /// Only meaningful while the receiver has not been handed to
    /// [`spawn_router`](Self::spawn_router).
    pub async fn settle(&mut self) -> Result<(), RouterError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(());
        };
        while let Some(batch) = receiver.try_next_batch() {
            self.router.apply(batch).await?;
        }
        Ok(())
    }

    /// Move the navigation loop onto its own task.
    pub fn spawn_router(&mut self) -> Option<tokio::task::JoinHandle<()>> {
        let receiver = self.receiver.take()?;
        let router = self.router.clone();
        Some(tokio::spawn(async move { router.run(receiver).await }))
    }
}
