//! `sessiongate-client`: session lifecycle, HTTP gateway and guarded routing.
//!
//! Components, leaves first:
//! - [`cookie`]: the persisted session cookie
//! - [`gateway`]: the single outbound HTTP channel and its interceptors
//! - [`session`]: token, claims and cookie kept in step
//! - [`guard`]: access decision for every transition
//! - [`router`]: route table and serialized navigation
//!
//! [`app::ClientApp`] wires them together.

pub mod app;
pub mod config;
pub mod cookie;
pub mod gateway;
pub mod guard;
pub mod navigation;
pub mod router;
pub mod session;

pub use app::ClientApp;
pub use config::{ClientConfig, ConfigError, ErrorRoutes};
pub use cookie::{CookieError, CookiePolicy, CookieStore, FileCookieStore, MemoryCookieStore, SameSite, StoredCookie};
pub use gateway::{
    ApiRequest, ApiResponse, ErrorRouteInterceptor, Gateway, GatewayError, ReqwestTransport, ResponseInterceptor,
    Transport,
};
pub use guard::{GuardOutcome, GuardState, NavigationGuard};
pub use navigation::{NavigationBatch, NavigationQueue, NavigationReceiver, NavigationRequest, Navigator, navigation_channel};
pub use router::{Location, Navigation, RouteDef, RouteTable, RouteTarget, Router, RouterError};
pub use session::{AuthError, Credentials, ExpiryCheck, Session, SessionStore};
