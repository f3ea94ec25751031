use std::sync::Arc;

use fmd_backoffice::{
    AppConfig, AppState, PostgresRepository, SupabaseAuth, config::Env, create_router,
    provider::AuthAdminState,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = AppConfig::load();

    // Structured JSON logs in production, human-readable output locally.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    match config.env {
        Env::Production => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        Env::Local => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(env = ?config.env, "starting fmd-backoffice");

    // Service-role pool: the back-office operates above row-level security, so
    // every request is privilege-checked in process before the pool is touched.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to database: {e}"));

    let repo = Arc::new(PostgresRepository::new(pool));

    // One provider client serves both roles: session resolution for the gate and
    // admin provisioning for the company-admin endpoints.
    let supabase = Arc::new(SupabaseAuth::new(&config));

    let state = AppState {
        repo,
        session: supabase.clone(),
        auth_admin: supabase as AuthAdminState,
        config,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .unwrap_or_else(|e| panic!("failed to bind 0.0.0.0:3000: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
