#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use sessiongate_auth::{AccessPolicy, Claims, privilege_set};
use sessiongate_client::{
    ApiRequest, ApiResponse, CookiePolicy, Credentials, ErrorRoutes, Gateway, GatewayError, MemoryCookieStore,
    NavigationGuard, NavigationReceiver, NavigationRequest, RouteTable, Router, SessionStore, Transport,
    navigation_channel,
};
use sessiongate_core::{ManualClock, UserId};

/// Fixed wall clock for every test, in seconds.
pub const NOW: i64 = 1_760_000_000;

/// Replays queued outcomes in order and records every request.
///
/// An empty queue answers `200` with an empty body.
#[derive(Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<Result<ApiResponse, GatewayError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubTransport {
    pub fn reply(&self, status: u16, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body)));
    }

    pub fn fail(&self, error: GatewayError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::new(200, Value::Null)))
    }
}

pub fn claims(id: i64, privileges: &[&'static str], exp: i64) -> Claims {
    Claims {
        sub: "User Details".to_string(),
        iss: "UA_FTI_SE_IMAGINEFRAME".to_string(),
        id: UserId::new(id),
        username: format!("user{id}"),
        privileges: privilege_set(privileges.iter().copied()),
        iat: exp - 86_400,
        exp,
    }
}

/// HS256 token as the server would issue it.
pub fn mint(claims: &Claims) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(b"server-side-secret"),
    )
    .expect("failed to encode jwt")
}

pub fn token_for(id: i64, privileges: &[&'static str]) -> String {
    mint(&claims(id, privileges, NOW + 3_600))
}

/// Every client component wired over a stub transport and an in-memory jar.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub transport: Arc<StubTransport>,
    pub cookies: Arc<MemoryCookieStore>,
    pub gateway: Gateway,
    pub session: SessionStore,
    pub router: Router,
    pub receiver: NavigationReceiver,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::from_timestamp(NOW));
        let transport = Arc::new(StubTransport::default());
        let cookies = Arc::new(MemoryCookieStore::new(clock.clone()));
        let (queue, receiver) = navigation_channel();
        let navigator = Arc::new(queue);

        let gateway = Gateway::new(transport.clone(), navigator.clone(), ErrorRoutes::default());
        let session = SessionStore::new(
            gateway.clone(),
            cookies.clone(),
            navigator,
            clock.clone(),
            CookiePolicy::default(),
        );
        let guard = NavigationGuard::new(AccessPolicy::standard(), ErrorRoutes::default());
        let router = Router::new(RouteTable::standard(), guard, session.clone());

        Self {
            clock,
            transport,
            cookies,
            gateway,
            session,
            router,
            receiver,
        }
    }

    /// Log in with a server reply carrying `token`.
    pub async fn login_with(&self, token: &str) -> Claims {
        self.transport.reply(200, json!({ "jwt-token": token }));
        self.session
            .login(&Credentials::new("user", "secret"))
            .await
            .expect("login failed")
    }

    pub async fn login_as(&self, id: i64, privileges: &[&'static str]) -> Claims {
        self.login_with(&token_for(id, privileges)).await
    }

    pub fn advance(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }

    /// Navigation requests queued so far.
    pub fn drain(&mut self) -> Vec<NavigationRequest> {
        self.receiver.drain()
    }

    /// Let the router perform every queued navigation request.
    pub async fn settle(&mut self) {
        while let Some(batch) = self.receiver.try_next_batch() {
            self.router.apply(batch).await.expect("navigation failed");
        }
    }
}

pub fn push(path: &str) -> NavigationRequest {
    NavigationRequest::Push(path.to_string())
}
