//! Session store: the one owner of the token, its claims and the cookie.
//!
//! A [`SessionStore`] is constructed once per client and cloned into every
//! component that needs it. The in-memory pair lives behind a single async
//! mutex, and the cookie is only written or removed while that mutex is held:
//! an expiry check and the teardown it triggers are one step, and memory and
//! cookie always name the same token. The lock is never held across a gateway
//! call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use sessiongate_auth::{Claims, MalformedTokenError, Principal, Token};
use sessiongate_core::Clock;

use crate::cookie::{CookiePolicy, CookieStore};
use crate::gateway::{ApiRequest, ApiResponse, Gateway, GatewayError, ResponseInterceptor};
use crate::navigation::Navigator;

pub const LOGIN_PATH: &str = "/auth/login";

/// Login response field carrying the new token.
pub const LOGIN_TOKEN_FIELD: &str = "jwt-token";

/// Optional field on any successful response carrying a refreshed token.
pub const REFRESH_TOKEN_FIELD: &str = "jwtToken";

pub const AUTHORIZATION: &str = "Authorization";

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A token together with the claims decoded from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Token,
    pub claims: Claims,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("login response carried no '{}' field", LOGIN_TOKEN_FIELD)]
    MissingToken,

    #[error("server issued a malformed token: {0}")]
    MalformedToken(#[from] MalformedTokenError),
}

/// Result of [`SessionStore::check_and_maybe_expire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    NoSession,
    Valid,
    /// The session was torn down by this call.
    Expired,
}

struct SessionShared {
    state: Mutex<Option<Session>>,
    cookies: Arc<dyn CookieStore>,
    policy: CookiePolicy,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
}

impl SessionShared {
    /// Decode `raw` and replace memory and cookie with it.
    ///
    /// Nothing changes when decoding fails.
    async fn install(&self, raw: &str) -> Result<Claims, MalformedTokenError> {
        let token = Token::new(raw);
        let claims = token.decode()?;

        let mut state = self.state.lock().await;
        self.write_cookie(&token).await;
        *state = Some(Session {
            token,
            claims: claims.clone(),
        });
        Ok(claims)
    }

    /// Caller holds the state lock.
    async fn write_cookie(&self, token: &Token) {
        let cookie = self.policy.issue(token.as_str(), self.clock.now());
        match self.cookies.set(cookie).await {
            Ok(()) => tracing::debug!(cookie = %self.policy.render("<redacted>"), "session cookie written"),
            Err(e) => {
                tracing::warn!(error = %e, "session cookie could not be written; session kept in memory only")
            }
        }
    }

    /// Caller holds the state lock.
    async fn forget_cookie(&self) {
        match self.cookies.remove(&self.policy.name).await {
            Ok(()) => tracing::debug!(cookie = %self.policy.render_removal(), "session cookie cleared"),
            Err(e) => tracing::warn!(error = %e, "session cookie could not be removed"),
        }
    }

    async fn teardown(&self) -> Option<Session> {
        let mut state = self.state.lock().await;
        let previous = state.take();
        self.forget_cookie().await;
        previous
    }

    fn navigate_to_logout(&self) {
        self.navigator.push("/");
        self.navigator.reload();
    }
}

/// Picks refreshed tokens off successful responses.
struct TokenRefreshInterceptor {
    shared: Arc<SessionShared>,
}

#[async_trait]
impl ResponseInterceptor for TokenRefreshInterceptor {
    fn name(&self) -> &'static str {
        "token-refresh"
    }

    async fn on_success(&self, response: &ApiResponse) {
        let Some(raw) = response.str_field(REFRESH_TOKEN_FIELD) else {
            return;
        };
        match self.shared.install(raw).await {
            Ok(claims) => tracing::info!(user_id = %claims.id, "session token refreshed"),
            Err(e) => tracing::warn!(error = %e, "refreshed token could not be decoded; ignored"),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<SessionShared>,
    gateway: Gateway,
}

impl SessionStore {
    /// Build the store and install its refresh interceptor on `gateway`.
    ///
    /// Starts logged out; call [`load`](Self::load) to restore a persisted
    /// session.
    pub fn new(
        gateway: Gateway,
        cookies: Arc<dyn CookieStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        policy: CookiePolicy,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            state: Mutex::new(None),
            cookies,
            policy,
            navigator,
            clock,
        });
        gateway.use_interceptor(Arc::new(TokenRefreshInterceptor {
            shared: shared.clone(),
        }));
        Self { shared, gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Restore the session from the persisted cookie.
    ///
    /// A cookie that does not decode, or whose claims are already expired, is
    /// torn down. Failures are logged and never returned.
    pub async fn load(&self) -> Option<Claims> {
        let mut state = self.shared.state.lock().await;
        let raw = match self.shared.cookies.get(&self.shared.policy.name).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("no persisted session");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "persisted session could not be read");
                return None;
            }
        };

        let token = Token::new(raw);
        let claims = match token.decode() {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "persisted token is malformed; discarding session");
                state.take();
                self.shared.forget_cookie().await;
                return None;
            }
        };

        if claims.is_expired(self.shared.clock.now()) {
            tracing::warn!(user_id = %claims.id, exp = claims.exp, "persisted session has expired; discarding");
            state.take();
            self.shared.forget_cookie().await;
            return None;
        }

        tracing::info!(user_id = %claims.id, username = %claims.username, "session restored");
        *state = Some(Session {
            token,
            claims: claims.clone(),
        });
        Some(claims)
    }

    /// Exchange credentials for a session.
    ///
    /// On any failure the previous session (if any) is left as it was.
    pub async fn login(&self, credentials: &Credentials) -> Result<Claims, AuthError> {
        let body = json!({
            "identifier": credentials.identifier,
            "password": credentials.password,
        });
        let response = self.gateway.send(ApiRequest::post(LOGIN_PATH, body)).await?;

        let raw = response
            .str_field(LOGIN_TOKEN_FIELD)
            .ok_or(AuthError::MissingToken)?;
        let claims = self.shared.install(raw).await?;

        tracing::info!(user_id = %claims.id, username = %claims.username, "logged in");
        Ok(claims)
    }

    /// Tear the session down, then navigate to `/` and reload.
    pub async fn logout(&self) {
        if let Some(previous) = self.shared.teardown().await {
            tracing::info!(user_id = %previous.claims.id, "logged out");
        }
        self.shared.navigate_to_logout();
    }

    /// Tear the session down if its claims have expired.
    ///
    /// The check, the teardown of memory and cookie, and the logout navigation
    /// request all happen under one lock. Concurrent callers observe exactly
    /// one `Expired`, and a token installed meanwhile waits for the teardown.
    pub async fn check_and_maybe_expire(&self) -> ExpiryCheck {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock().await;
        match state.as_ref().map(|s| s.claims.is_expired(now)) {
            None => return ExpiryCheck::NoSession,
            Some(false) => return ExpiryCheck::Valid,
            Some(true) => {}
        }

        if let Some(session) = state.take() {
            tracing::warn!(user_id = %session.claims.id, exp = session.claims.exp, "session expired");
        }
        self.shared.forget_cookie().await;
        self.shared.navigate_to_logout();
        drop(state);
        ExpiryCheck::Expired
    }

    /// The `Authorization` header for the current token, without any check.
    pub async fn header(&self) -> Option<(String, String)> {
        self.shared
            .state
            .lock()
            .await
            .as_ref()
            .map(|s| (AUTHORIZATION.to_string(), format!("Bearer {}", s.token.as_str())))
    }

    /// Expiry check, then the header map (empty when logged out).
    pub async fn auth_header(&self) -> HashMap<String, String> {
        self.check_and_maybe_expire().await;
        self.header().await.into_iter().collect()
    }

    /// Replace the session with `raw`, exactly as a login would.
    ///
    /// A token that does not decode leaves the current session in place.
    pub async fn update_token(&self, raw: &str) -> Result<Claims, MalformedTokenError> {
        match self.shared.install(raw).await {
            Ok(claims) => {
                tracing::info!(user_id = %claims.id, "session token replaced");
                Ok(claims)
            }
            Err(e) => {
                tracing::warn!(error = %e, "replacement token could not be decoded; ignored");
                Err(e)
            }
        }
    }

    /// Send through the gateway with the current header attached.
    ///
    /// Once the session has expired the request goes out unauthenticated.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let request = self
            .auth_header()
            .await
            .into_iter()
            .fold(request, |req, (name, value)| req.with_header(name, value));
        self.gateway.send(request).await
    }

    pub async fn is_logged_in(&self) -> bool {
        self.shared.state.lock().await.is_some()
    }

    pub async fn session(&self) -> Option<Session> {
        self.shared.state.lock().await.clone()
    }

    pub async fn claims(&self) -> Option<Claims> {
        self.shared.state.lock().await.as_ref().map(|s| s.claims.clone())
    }

    pub async fn token(&self) -> Option<Token> {
        self.shared.state.lock().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.shared
            .state
            .lock()
            .await
            .as_ref()
            .map(|s| s.claims.principal())
    }
}
