use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Modules ---

// Gating protocol and supporting services.
pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod repository;

// Router assembly, split by audience (public probe, admin API, static pages).
pub mod routes;
use routes::{admin, pages, public};

// Re-exported for main.rs and the integration tests.
pub use auth::{MockSessionResolver, SessionState};
pub use config::AppConfig;
pub use provider::{AuthAdminState, MockAuthAdmin, SupabaseAuth};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI description of the admin API, collected from the `#[utoipa::path]`
/// handler annotations and the `ToSchema` derives on the models. Served as JSON
/// at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_companies, handlers::create_company, handlers::get_company_details,
        handlers::update_company, handlers::delete_company, handlers::create_company_admin,
        handlers::get_company_config, handlers::update_company_config,
        handlers::list_users, handlers::update_user, handlers::delete_user,
        handlers::get_app_config, handlers::update_app_config,
        handlers::list_rewards, handlers::create_reward, handlers::update_reward,
        handlers::delete_reward, handlers::toggle_reward,
    ),
    components(
        schemas(
            models::Company, models::User, models::CoarseRole, models::AccountType,
            models::CompanyConfigEntry, models::AppConfigEntry, models::Reward,
            models::CreateCompanyRequest, models::UpdateCompanyRequest,
            models::CreateCompanyAdminRequest, models::CreateCompanyAdminResponse,
            models::UpdateUserRequest, models::CreateRewardRequest,
            models::UpdateRewardRequest, models::ToggleRewardRequest,
            models::CompanyDetails,
        )
    ),
    tags(
        (name = "fmd-backoffice", description = "Super-admin back-office API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The one shared, immutable state container cloned into every request.
/// Everything the gating protocol touches (resolver, repository, config) travels
/// through here as explicit context; nothing is read from ambient/global scope.
#[derive(Clone)]
pub struct AppState {
    /// Repository layer: direct store access through the service-role pool.
    pub repo: RepositoryState,
    /// Session Resolver: the boundary to the hosted auth provider's session API.
    pub session: SessionState,
    /// Provider admin client: account provisioning/deletion, email propagation.
    pub auth_admin: AuthAdminState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// FromRef lets extractors pull just the piece of state they need; the
// CurrentSession extractor relies on these for the resolver, repo and config.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.session.clone()
    }
}

impl FromRef<AppState> for AuthAdminState {
    fn from_ref(app_state: &AppState) -> AuthAdminState {
        app_state.auth_admin.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Builds the full router: API and page routes, the Route Gate in front of them,
/// and the observability layers around everything.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health probe, outside the gate's interest.
        .merge(public::public_routes())
        // Admin API: the Route Gate passes /api through; every handler re-checks
        // privilege itself, making the per-endpoint guard the authoritative layer.
        .nest("/api", admin::api_routes())
        // Page paths (login + admin screens) resolve to the static bundle.
        .fallback_service(pages::static_site())
        // The Route Gate runs before any handler or file read: classify the path,
        // resolve the session once, re-check the privilege flag, allow or redirect.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::route_gate,
        ))
        .with_state(state);

    // Correlation and tracing wrap everything, the gate included, so redirects
    // and 401s show up in the request log with their request id.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: tags the request span with method, URI and the
/// generated `x-request-id` so all log lines of one request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
