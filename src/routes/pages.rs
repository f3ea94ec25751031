use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_status::SetStatus;

/// Pages Router Module
///
/// Serves the pre-built back-office bundle. Unknown paths fall back to the SPA
/// entry point so client-side routing works for /stats, /companies, /users,
/// /app-config, /rewards and /login, all of which the Route Gate has already
/// classified and, where required, authorized before the file is read.
pub fn static_site() -> ServeDir<SetStatus<ServeFile>> {
    ServeDir::new("dist").not_found_service(ServeFile::new("dist/index.html"))
}
