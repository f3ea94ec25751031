use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    auth::Principal,
    error::ApiError,
    models::CoarseRole,
    repository::RepositoryState,
};

/// PrivilegeFlag
///
/// The stored super-admin flag as it actually arrives from the data store. Depending
/// on the store's migration history the column holds either a native boolean or a
/// string-encoded boolean (`"true"` / `"t"`); this is an external-system quirk we
/// absorb at the boundary, not a representation we ever let propagate. Everything
/// past `is_elevated()` deals in strict bools only.
#[derive(Debug, Clone, PartialEq)]
pub enum PrivilegeFlag {
    Boolean(bool),
    LegacyString(String),
}

impl PrivilegeFlag {
    /// The single normalization rule shared by the Route Gate and every
    /// per-endpoint guard, so the two layers can never disagree:
    /// privileged iff `true`, `"true"`, or `"t"`; everything else is false.
    pub fn is_elevated(&self) -> bool {
        match self {
            PrivilegeFlag::Boolean(value) => *value,
            PrivilegeFlag::LegacyString(value) => value == "true" || value == "t",
        }
    }

    /// Decodes the flag column from a Postgres row, trying the native boolean
    /// representation first and falling back to text. A NULL in either shape
    /// normalizes to a non-privileged value.
    pub fn from_pg_row(row: &PgRow, column: &str) -> Result<Self, sqlx::Error> {
        if let Ok(value) = row.try_get::<Option<bool>, _>(column) {
            return Ok(PrivilegeFlag::Boolean(value.unwrap_or(false)));
        }
        let value: Option<String> = row.try_get(column)?;
        Ok(PrivilegeFlag::LegacyString(value.unwrap_or_default()))
    }
}

/// PrivilegeRecord
///
/// The subset of a user row the Authorization Guard needs: the raw privilege flag
/// and the coarse role. Fetched through the service-role pool so the lookup works
/// even under a row-level policy that hides the caller's own row from them.
#[derive(Debug, Clone)]
pub struct PrivilegeRecord {
    pub id: Uuid,
    pub super_admin: PrivilegeFlag,
    pub role: CoarseRole,
}

/// is_super_admin
///
/// The Authorization Guard. `None` principals are never privileged; a missing row,
/// a malformed row, or a store failure all resolve to `false`: absence of proof of
/// privilege is absence of privilege. Each call performs a fresh lookup; there is no
/// caching, so revoking the flag takes effect on the very next request.
pub async fn is_super_admin(repo: &RepositoryState, principal: Option<&Principal>) -> bool {
    let Some(principal) = principal else {
        return false;
    };
    match repo.get_privilege_record(principal.id).await {
        Ok(Some(record)) => record.super_admin.is_elevated(),
        Ok(None) => false,
        Err(e) => {
            // Fail closed: a lookup error must never grant access.
            tracing::warn!(principal = %principal.id, "privilege lookup failed: {e}");
            false
        }
    }
}

/// require_super_admin
///
/// The per-endpoint guard used inside every state-mutating handler. Intentionally
/// redundant with the Route Gate: the gate is an early reject, this is the
/// authoritative check at the point of mutation. The rejection is a uniform 401 so
/// API callers cannot distinguish "no session" from "session without privilege".
pub async fn require_super_admin(
    repo: &RepositoryState,
    principal: Option<&Principal>,
) -> Result<Principal, ApiError> {
    match principal {
        Some(p) if is_super_admin(repo, Some(p)).await => Ok(p.clone()),
        _ => Err(ApiError::Unauthorized),
    }
}
