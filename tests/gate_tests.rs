mod common;

use common::{MockRepository, no_redirect_client, session_cookie, spawn_app};
use fmd_backoffice::{
    MockAuthAdmin, MockSessionResolver,
    authz::PrivilegeFlag,
    gate::{GateOutcome, RouteClass, classify, evaluate, is_gate_exempt},
};
use reqwest::{StatusCode, header};
use uuid::Uuid;

// --- Path classification (pure) ---

#[test]
fn protected_prefixes_classify_segment_aware() {
    assert_eq!(classify("/stats"), RouteClass::Protected);
    assert_eq!(classify("/companies"), RouteClass::Protected);
    assert_eq!(
        classify("/companies/6f9619ff-8b86-d011-b42d-00c04fc964ff"),
        RouteClass::Protected
    );
    assert_eq!(classify("/users/42/edit"), RouteClass::Protected);
    assert_eq!(classify("/app-config"), RouteClass::Protected);
    assert_eq!(classify("/rewards"), RouteClass::Protected);

    // Prefix match must not bleed into sibling paths.
    assert_eq!(classify("/usersettings"), RouteClass::Public);
    assert_eq!(classify("/statistics"), RouteClass::Public);
}

#[test]
fn login_and_public_paths_classify() {
    assert_eq!(classify("/login"), RouteClass::Login);
    assert_eq!(classify("/"), RouteClass::Public);
    assert_eq!(classify("/about"), RouteClass::Public);
    // API paths pass the gate; the per-endpoint guard answers with JSON instead.
    assert_eq!(classify("/api/companies"), RouteClass::Public);
}

#[test]
fn asset_and_probe_paths_are_exempt() {
    assert!(is_gate_exempt("/health"));
    assert!(is_gate_exempt("/favicon.ico"));
    assert!(is_gate_exempt("/assets/index-abc123.js"));
    assert!(is_gate_exempt("/logo.SVG"));
    assert!(!is_gate_exempt("/stats"));
    assert!(!is_gate_exempt("/login"));
}

#[test]
fn gate_state_machine_outcomes() {
    // Protected: only an authenticated, privileged caller passes.
    assert_eq!(
        evaluate(RouteClass::Protected, true, true),
        GateOutcome::Allow
    );
    assert_eq!(
        evaluate(RouteClass::Protected, true, false),
        GateOutcome::RedirectLogin
    );
    assert_eq!(
        evaluate(RouteClass::Protected, false, false),
        GateOutcome::RedirectLogin
    );

    // Login: an already-authorized session bounces to the dashboard.
    assert_eq!(
        evaluate(RouteClass::Login, true, true),
        GateOutcome::RedirectDashboard
    );
    assert_eq!(evaluate(RouteClass::Login, true, false), GateOutcome::Allow);
    assert_eq!(evaluate(RouteClass::Login, false, false), GateOutcome::Allow);

    // Public paths never redirect.
    assert_eq!(evaluate(RouteClass::Public, false, false), GateOutcome::Allow);
    assert_eq!(evaluate(RouteClass::Public, true, true), GateOutcome::Allow);
}

// --- Gate middleware (full stack) ---

#[tokio::test]
async fn anonymous_request_to_protected_page_redirects_to_login() {
    let app = spawn_app(
        MockRepository::new(),
        MockSessionResolver::new(),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let response = client
        .get(format!("{}/stats", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login"
    );
}

#[tokio::test]
async fn unprivileged_session_gets_the_same_redirect_as_anonymous() {
    let user_id = Uuid::new_v4();
    let app = spawn_app(
        MockRepository::new().with_plain_user(user_id),
        MockSessionResolver::new().with_session("user-token", user_id),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let response = client
        .get(format!("{}/companies", app.address))
        .header(header::COOKIE, session_cookie("user-token"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login"
    );
}

#[tokio::test]
async fn privileged_session_passes_the_gate() {
    let admin_id = Uuid::new_v4();
    let app = spawn_app(
        MockRepository::new().with_privileged_user(admin_id),
        MockSessionResolver::new().with_session("admin-token", admin_id),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let response = client
        .get(format!("{}/stats", app.address))
        .header(header::COOKIE, session_cookie("admin-token"))
        .send()
        .await
        .unwrap();

    assert!(!response.status().is_redirection());
}

#[tokio::test]
async fn privileged_session_on_login_page_bounces_to_dashboard() {
    let admin_id = Uuid::new_v4();
    let app = spawn_app(
        MockRepository::new().with_privileged_user(admin_id),
        MockSessionResolver::new().with_session("admin-token", admin_id),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let response = client
        .get(format!("{}/login", app.address))
        .header(header::COOKIE, session_cookie("admin-token"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/stats");
}

#[tokio::test]
async fn unprivileged_session_may_view_the_login_page() {
    let user_id = Uuid::new_v4();
    let app = spawn_app(
        MockRepository::new().with_plain_user(user_id),
        MockSessionResolver::new().with_session("user-token", user_id),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let response = client
        .get(format!("{}/login", app.address))
        .header(header::COOKIE, session_cookie("user-token"))
        .send()
        .await
        .unwrap();

    assert!(!response.status().is_redirection());
}

#[tokio::test]
async fn revoked_privilege_takes_effect_on_the_next_request() {
    let admin_id = Uuid::new_v4();
    let app = spawn_app(
        MockRepository::new().with_privileged_user(admin_id),
        MockSessionResolver::new().with_session("admin-token", admin_id),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let first = client
        .get(format!("{}/stats", app.address))
        .header(header::COOKIE, session_cookie("admin-token"))
        .send()
        .await
        .unwrap();
    assert!(!first.status().is_redirection());

    // Revoke the flag in the store; the session cookie itself is still valid.
    app.repo
        .set_privilege(admin_id, PrivilegeFlag::Boolean(false));

    let second = client
        .get(format!("{}/stats", app.address))
        .header(header::COOKIE, session_cookie("admin-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SEE_OTHER);
    assert_eq!(second.headers().get(header::LOCATION).unwrap(), "/login");
}

#[tokio::test]
async fn refreshed_cookies_are_written_even_on_a_rejected_request() {
    let user_id = Uuid::new_v4();
    let app = spawn_app(
        MockRepository::new().with_plain_user(user_id),
        MockSessionResolver::new()
            .with_session("stale-token", user_id)
            .with_refresh("fresh-access", "fresh-refresh"),
        MockAuthAdmin::new(),
    )
    .await;
    let client = no_redirect_client();

    let response = client
        .get(format!("{}/stats", app.address))
        .header(header::COOKIE, session_cookie("stale-token"))
        .send()
        .await
        .unwrap();

    // Unprivileged, so the request is redirected away...
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // ...but the refreshed session still reaches the browser.
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("sb-access-token=fresh-access")),
        "missing refreshed access cookie in {cookies:?}"
    );
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("sb-refresh-token=fresh-refresh")),
        "missing refreshed refresh cookie in {cookies:?}"
    );
}

#[tokio::test]
async fn health_probe_skips_the_gate() {
    let app = spawn_app(
        MockRepository::new().failing_privilege_lookup(),
        MockSessionResolver::new(),
        MockAuthAdmin::new(),
    )
    .await;

    let response = reqwest::get(format!("{}/health", app.address))
        .await
        .unwrap();
    assert!(response.status().is_success());
}
