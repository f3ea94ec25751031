use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::PrivilegeFlag;

// --- Core Application Schemas (Mapped to Database) ---

/// CoarseRole
///
/// The coarse role stored on every user row: company administrators vs. regular
/// employees. Orthogonal to the `super_admin` privilege flag, which is what actually
/// gates access to this back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CoarseRole {
    Admin,
    #[default]
    Employee,
}

/// AccountType
///
/// Distinguishes direct-consumer accounts from accounts provisioned through an
/// employer contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    B2c,
    B2b2c,
}

/// Company
///
/// A client company enrolled on the platform, with its yearly sustainable-mobility
/// budget (FMD) and declared headcount.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Yearly FMD budget in euros, shared across the company's employees.
    pub fmd_budget_per_year: f64,
    pub employee_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// The canonical profile record from the `public.users` table, mirroring the
/// provider-owned `auth.users` row by primary key.
///
/// The stored `super_admin` column may be a native boolean or a string-encoded
/// boolean depending on the store's migration history; `from_row` normalizes it
/// to a strict bool so the ambiguity never leaves the data-access boundary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: CoarseRole,
    pub super_admin: bool,
    pub company_id: Option<Uuid>,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            role: row.try_get("role")?,
            // Single normalization point for the bool-or-string column.
            super_admin: PrivilegeFlag::from_pg_row(row, "super_admin")?.is_elevated(),
            company_id: row.try_get("company_id")?,
            account_type: row.try_get("account_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// CompanyConfigEntry
///
/// One key/value override for a specific company (e.g. `fmd_rate_per_km`). Values
/// are stored as strings; interpretation happens in the consumer apps.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct CompanyConfigEntry {
    pub company_id: Uuid,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// AppConfigEntry
///
/// One global platform configuration key/value pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct AppConfigEntry {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Reward
///
/// A catalog entry employees can redeem points against.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Reward {
    pub id: Uuid,
    pub partner_name: String,
    pub point_cost: i32,
    pub description: Option<String>,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Display ordering weight; higher values surface first in the catalog.
    pub priority: i32,
    pub min_points_required: i32,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateCompanyRequest
///
/// Input payload for enrolling a new company (POST /api/companies).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub fmd_budget_per_year: f64,
    pub employee_count: i32,
}

/// UpdateCompanyRequest
///
/// Partial update payload for a company. Uses `Option<T>` so only provided fields
/// are touched (COALESCE at the repository layer).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateCompanyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fmd_budget_per_year: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<i32>,
}

/// CreateCompanyAdminRequest
///
/// Input payload for provisioning a company administrator account
/// (POST /api/companies/create-admin). The password is forwarded to the hosted
/// auth provider and never persisted or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyAdminRequest {
    pub company_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// CreateCompanyAdminResponse
///
/// The provider-assigned identifier of the freshly provisioned administrator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateCompanyAdminResponse {
    pub success: bool,
    pub user_id: Uuid,
}

/// UpdateUserRequest
///
/// Full-profile update for a user row (PUT /api/users/{id}). Email, role and
/// account type are mandatory; the rest clears to NULL/false when omitted,
/// matching the back-office edit form semantics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateUserRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: CoarseRole,
    #[serde(default)]
    pub super_admin: bool,
    pub account_type: AccountType,
    pub company_id: Option<Uuid>,
}

/// CreateRewardRequest
///
/// Input payload for adding a catalog entry (POST /api/rewards).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateRewardRequest {
    pub partner_name: String,
    pub point_cost: i32,
    pub description: Option<String>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
    pub priority: Option<i32>,
    pub min_points_required: Option<i32>,
}

/// UpdateRewardRequest
///
/// Partial update payload for a catalog entry (PUT /api/rewards/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateRewardRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_cost: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_points_required: Option<i32>,
}

/// ToggleRewardRequest
///
/// Payload for PATCH /api/rewards/{id}/toggle. A dedicated struct (rather than a
/// bare bool) so a missing or mistyped field is rejected, not silently defaulted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToggleRewardRequest {
    pub is_active: bool,
}

/// ConfigUpsert
///
/// Internal representation of one key/value pair from a config PUT body, after
/// stringification and validation in the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigUpsert {
    pub key: String,
    pub value: String,
}

// --- Composite Output Schemas ---

/// CompanyDetails
///
/// Aggregated view backing the company detail screen: the company row plus its
/// user roster and config overrides.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CompanyDetails {
    pub company: Company,
    pub users: Vec<User>,
    pub config: Vec<CompanyConfigEntry>,
}
