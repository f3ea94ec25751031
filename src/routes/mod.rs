/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules.
/// The Route Gate middleware (gate.rs) runs in front of all of them; the admin
/// API additionally re-checks privilege inside every handler, so access control
/// never depends on a single layer.

/// Routes accessible without any session (health check).
pub mod public;

/// The super-admin REST API under /api. Every handler carries its own guard.
pub mod admin;

/// The static back-office bundle (login page, admin screens). Page paths are
/// classified and protected by the Route Gate before the files are served.
pub mod pages;
