use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable by any client, anonymous or not. Deliberately tiny: this
/// back-office has no anonymous features beyond the login page (served as a static
/// asset) and the health probe.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        // Exempt from the Route Gate so probes never trigger session resolution.
        .route("/health", get(|| async { "ok" }))
}
