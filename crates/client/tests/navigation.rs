mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use common::{Harness, NOW, StubTransport, claims, mint, token_for};
use sessiongate_client::{
    ApiRequest, ClientApp, ClientConfig, CookiePolicy, CookieStore, GuardOutcome, GuardState, MemoryCookieStore,
    Navigation, Navigator,
};
use sessiongate_core::ManualClock;

fn landed(nav: &Navigation) -> &str {
    nav.location().expect("navigation was cancelled").path.as_str()
}

fn outcome(nav: &Navigation) -> &GuardOutcome {
    match nav {
        Navigation::Completed { outcome, .. } => outcome,
        Navigation::Cancelled { .. } => panic!("navigation was cancelled"),
    }
}

#[tokio::test]
async fn anonymous_visit_to_users_lands_on_unauthorized_page() {
    let h = Harness::new();
    let nav = h.router.navigate("/users").await.unwrap();
    assert_eq!(
        outcome(&nav),
        &GuardOutcome::RedirectUnauthenticated {
            to: "/error/401".to_string()
        }
    );
    assert_eq!(landed(&nav), "/error/401");
}

#[tokio::test]
async fn logon_only_user_is_forbidden_from_users() {
    let h = Harness::new();
    h.login_as(2, &["logon"]).await;

    let nav = h.router.navigate("/users").await.unwrap();
    assert_eq!(
        outcome(&nav),
        &GuardOutcome::RedirectUnauthorized {
            to: "/error/403".to_string()
        }
    );
    assert_eq!(landed(&nav), "/error/403");
}

#[tokio::test]
async fn any_one_listed_privilege_is_enough() {
    let h = Harness::new();
    h.login_as(2, &["product_read"]).await;

    let nav = h.router.navigate("/products").await.unwrap();
    assert_eq!(outcome(&nav), &GuardOutcome::Allowed);
    assert_eq!(landed(&nav), "/products");
}

#[tokio::test]
async fn own_record_is_reachable_without_privileges() {
    let h = Harness::new();
    h.login_as(7, &["logon"]).await;

    let own = h.router.navigate("/users/7").await.unwrap();
    assert_eq!(landed(&own), "/users/7");
    assert_eq!(
        own.location().unwrap().params.get("id").map(String::as_str),
        Some("7")
    );

    let other = h.router.navigate("/users/8").await.unwrap();
    assert_eq!(landed(&other), "/error/403");
}

#[tokio::test]
async fn record_privilege_reaches_any_record() {
    let h = Harness::new();
    h.login_as(7, &["admin_write"]).await;
    assert_eq!(landed(&h.router.navigate("/users/8").await.unwrap()), "/users/8");

    let nav = h.router.navigate("/projects/3").await.unwrap();
    assert_eq!(landed(&nav), "/error/403");
}

#[tokio::test]
async fn project_record_allows_self_or_project_write() {
    let h = Harness::new();
    h.login_as(3, &["logon"]).await;
    assert_eq!(landed(&h.router.navigate("/projects/3").await.unwrap()), "/projects/3");
    assert_eq!(landed(&h.router.navigate("/projects/4").await.unwrap()), "/error/403");

    h.login_as(5, &["project_write"]).await;
    assert_eq!(landed(&h.router.navigate("/projects/4").await.unwrap()), "/projects/4");
}

#[tokio::test]
async fn repeated_slashes_do_not_skip_privilege_checks() {
    let h = Harness::new();
    h.login_as(2, &["logon"]).await;

    for path in ["//users", "/users//", "///users", "/users//8", "//users/8"] {
        let nav = h.router.navigate(path).await.unwrap();
        assert_eq!(landed(&nav), "/error/403", "{path}");
        assert_eq!(nav.location().unwrap().name, "forbidden", "{path}");
    }

    let own = h.router.navigate("/users//2").await.unwrap();
    assert_eq!(landed(&own), "/users/2");
}

#[tokio::test]
async fn root_redirect_depends_on_session() {
    let h = Harness::new();
    assert_eq!(landed(&h.router.navigate("/").await.unwrap()), "/welcome");

    h.login_as(1, &["logon"]).await;
    assert_eq!(landed(&h.router.navigate("/").await.unwrap()), "/home");
}

#[tokio::test]
async fn unknown_paths_land_on_not_found() {
    let h = Harness::new();
    h.login_as(1, &["logon"]).await;
    for path in ["/nowhere", "/users/1/edit", "/error"] {
        assert_eq!(landed(&h.router.navigate(path).await.unwrap()), "/error/404", "{path}");
    }
}

#[tokio::test]
async fn trailing_slash_and_query_are_ignored() {
    let h = Harness::new();
    h.login_as(1, &["groups_read"]).await;
    let nav = h.router.navigate("/groups/?sort=name").await.unwrap();
    assert_eq!(landed(&nav), "/groups");
}

#[tokio::test]
async fn expiry_during_navigation_redirects_then_logs_out() {
    let mut h = Harness::new();
    h.login_with(&mint(&claims(1, &["logon"], NOW + 30))).await;
    h.advance(31);

    let nav = h.router.navigate("/profile").await.unwrap();
    assert_eq!(landed(&nav), "/error/401");

    h.settle().await;
    let here = h.router.current();
    assert_eq!(here.path, "/welcome");
    assert_eq!(here.epoch, 1);
}

#[tokio::test]
async fn api_not_found_moves_to_error_page() {
    let mut h = Harness::new();
    h.login_as(1, &["logon"]).await;
    h.router.navigate("/events").await.unwrap();

    h.transport.reply(404, json!({"message": "no such event"}));
    assert!(h.session.send(ApiRequest::get("/events/99")).await.is_err());

    h.settle().await;
    assert_eq!(h.router.current().path, "/error/404");
}

#[tokio::test]
async fn guard_returns_to_idle_after_commit() {
    let h = Harness::new();
    h.router.navigate("/login").await.unwrap();
    assert_eq!(h.router.guard().state(), GuardState::Idle);
}

#[tokio::test]
async fn explanation_reports_self_access() {
    let h = Harness::new();
    h.login_as(4, &["logon"]).await;
    let principal = h.session.principal().await;
    let explanation = h.router.guard().explain("/users/4", principal.as_ref());
    assert_eq!(explanation.reason, "record is the acting user");
}

#[tokio::test]
async fn app_restores_cookie_session_on_start() {
    let clock = Arc::new(ManualClock::from_timestamp(NOW));
    let cookies = Arc::new(MemoryCookieStore::new(clock.clone()));
    cookies
        .set(CookiePolicy::default().issue(&token_for(5, &["logon"]), Utc.timestamp_opt(NOW, 0).unwrap()))
        .await
        .unwrap();

    let mut app = ClientApp::with_parts(
        ClientConfig::default(),
        Arc::new(StubTransport::default()),
        cookies,
        clock,
    );
    let nav = app.start("/").await.unwrap();
    assert_eq!(landed(&nav), "/home");
    assert!(app.session.is_logged_in().await);
}

#[tokio::test]
async fn spawned_router_serves_navigator_requests() {
    let clock = Arc::new(ManualClock::from_timestamp(NOW));
    let mut app = ClientApp::with_parts(
        ClientConfig::default(),
        Arc::new(StubTransport::default()),
        Arc::new(MemoryCookieStore::new(clock.clone())),
        clock,
    );
    app.start("/welcome").await.unwrap();

    let mut locations = app.router.subscribe();
    let handle = app.spawn_router().expect("router already spawned");
    app.navigator().push("/register");

    locations.changed().await.unwrap();
    assert_eq!(locations.borrow().path, "/register");
    handle.abort();
}
