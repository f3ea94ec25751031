use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Admin API Router Module
///
/// The REST surface of the back-office, nested under `/api`. The Route Gate lets
/// these paths through without redirecting (an API caller wants JSON, not an HTML
/// login page), so the per-endpoint guard inside every handler is the authoritative
/// check here: each one calls `require_super_admin` before touching the store.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // --- Companies ---
        // Enrollment, listing, the detail aggregate, and removal.
        .route(
            "/companies",
            get(handlers::list_companies).post(handlers::create_company),
        )
        .route(
            "/companies/{id}",
            get(handlers::get_company_details)
                .put(handlers::update_company)
                .delete(handlers::delete_company),
        )
        // POST /api/companies/create-admin
        // Two-step provisioning: auth provider account first, mirrored profile row
        // second, with provider-side cleanup if the second step fails.
        .route(
            "/companies/create-admin",
            post(handlers::create_company_admin),
        )
        // Per-company config overrides, upserted key by key.
        .route(
            "/companies/{id}/config",
            get(handlers::get_company_config).put(handlers::update_company_config),
        )
        // --- Users ---
        .route("/users", get(handlers::list_users))
        .route(
            "/users/{id}",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        // --- Global configuration ---
        .route(
            "/app-config",
            get(handlers::get_app_config).put(handlers::update_app_config),
        )
        // --- Rewards catalog ---
        .route(
            "/rewards",
            get(handlers::list_rewards).post(handlers::create_reward),
        )
        .route(
            "/rewards/{id}",
            put(handlers::update_reward).delete(handlers::delete_reward),
        )
        .route("/rewards/{id}/toggle", patch(handlers::toggle_reward))
}
