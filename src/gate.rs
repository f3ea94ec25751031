use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{AppState, auth::ResolvedSession, authz};

/// Path the gate sends unauthenticated or unprivileged callers to.
pub const LOGIN_PATH: &str = "/login";
/// Default landing page for an already-authorized session hitting the login page.
pub const DASHBOARD_PATH: &str = "/stats";

/// Page prefixes that require super-admin privilege. `/api` is intentionally absent:
/// API requests pass the gate and are rejected with a JSON 401 by the per-endpoint
/// guard instead of being redirected to an HTML login page.
const PROTECTED_PREFIXES: &[&str] = &["/stats", "/companies", "/users", "/app-config", "/rewards"];

/// File extensions the static bundle serves; requests for these skip the gate.
const ASSET_EXTENSIONS: &[&str] = &[
    ".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".ico", ".css", ".js", ".map", ".woff",
    ".woff2", ".ttf",
];

/// RouteClass
///
/// Static classification of a request path. Depends on the path prefix only, never
/// on the HTTP method or the query string, so a given URL always classifies the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    Login,
    Public,
}

/// GateOutcome
///
/// Terminal outcome of the Route Gate state machine for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    RedirectLogin,
    RedirectDashboard,
}

/// classify
///
/// Maps a path to its gate classification. Prefix matching is segment-aware:
/// `/users` and `/users/42` are protected, `/usersettings` is not.
pub fn classify(path: &str) -> RouteClass {
    if path == LOGIN_PATH {
        return RouteClass::Login;
    }
    let protected = PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")));
    if protected {
        RouteClass::Protected
    } else {
        RouteClass::Public
    }
}

/// is_gate_exempt
///
/// Static-asset and health-check paths skip session resolution entirely. Everything
/// else (any method, any query string) is evaluated by the gate before any
/// handler runs.
pub fn is_gate_exempt(path: &str) -> bool {
    if path == "/health" || path == "/favicon.ico" || path.starts_with("/assets/") {
        return true;
    }
    let lowered = path.to_ascii_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// evaluate
///
/// The pure gate state machine: classification x authentication x privilege.
/// An unauthenticated caller and an authenticated-but-unprivileged caller get the
/// same redirect, so the outcome leaks nothing about privilege state.
pub fn evaluate(class: RouteClass, authenticated: bool, privileged: bool) -> GateOutcome {
    match class {
        RouteClass::Protected => {
            if authenticated && privileged {
                GateOutcome::Allow
            } else {
                GateOutcome::RedirectLogin
            }
        }
        RouteClass::Login => {
            if authenticated && privileged {
                GateOutcome::RedirectDashboard
            } else {
                GateOutcome::Allow
            }
        }
        RouteClass::Public => GateOutcome::Allow,
    }
}

/// route_gate
///
/// Middleware applied to the whole router: resolves the session once, re-checks the
/// privilege flag on every request (no session-level caching, so a revoked flag takes
/// effect on the very next request), and either forwards, or redirects. The resolved
/// session is stashed in the request extensions for the handler-side extractor, and
/// refreshed session cookies are written to the outgoing response even when the
/// request is rejected.
pub async fn route_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_gate_exempt(&path) {
        return next.run(request).await;
    }

    // One provider call per request; session resolution must complete before the
    // privilege lookup, which needs the resolved principal.
    let session = state.session.resolve(&jar).await;
    request.extensions_mut().insert(session.clone());

    let class = classify(&path);
    let outcome = match class {
        RouteClass::Public => GateOutcome::Allow,
        RouteClass::Protected | RouteClass::Login => {
            let privileged = match &session.principal {
                Some(principal) => authz::is_super_admin(&state.repo, Some(principal)).await,
                None => false,
            };
            evaluate(class, session.principal.is_some(), privileged)
        }
    };

    let mut response = match outcome {
        GateOutcome::Allow => next.run(request).await,
        GateOutcome::RedirectLogin => Redirect::to(LOGIN_PATH).into_response(),
        GateOutcome::RedirectDashboard => Redirect::to(DASHBOARD_PATH).into_response(),
    };

    apply_refreshed_cookies(&session, &mut response);
    response
}

/// Writes the refreshed token pair onto the response, keeping legitimate sessions
/// alive across rejected requests too.
fn apply_refreshed_cookies(session: &ResolvedSession, response: &mut Response) {
    let Some(tokens) = &session.refreshed else {
        return;
    };
    for cookie in tokens.to_cookies() {
        if let Ok(value) = header::HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}
