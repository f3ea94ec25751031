use crate::{
    authz::{PrivilegeFlag, PrivilegeRecord},
    error::{PrivilegeLookupError, RepoError},
    models::{
        AppConfigEntry, Company, CompanyConfigEntry, ConfigUpsert, CreateCompanyRequest,
        CreateRewardRequest, Reward, UpdateCompanyRequest, UpdateRewardRequest, UpdateUserRequest,
        User,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Row, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers interact
/// with the data layer through this trait without knowing the concrete implementation
/// (Postgres in production, in-memory mocks in tests).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Companies ---
    async fn list_companies(&self) -> Result<Vec<Company>, RepoError>;
    async fn get_company(&self, id: Uuid) -> Result<Option<Company>, RepoError>;
    async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, RepoError>;
    // Partial update via COALESCE; None means the company does not exist.
    async fn update_company(
        &self,
        id: Uuid,
        req: UpdateCompanyRequest,
    ) -> Result<Option<Company>, RepoError>;
    async fn delete_company(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Users ---
    async fn list_users(&self, company_id: Option<Uuid>) -> Result<Vec<User>, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<User>, RepoError>;
    // Upserts the mirrored profile row for a freshly provisioned company admin.
    async fn assign_company_admin(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepoError>;

    // --- Privilege (Authorization Guard lookup) ---
    /// Fetches the raw privilege row for a principal. Runs on the service-role pool,
    /// bypassing row-level policy: the caller cannot yet be proven to have visibility
    /// into their own row under a restrictive policy.
    async fn get_privilege_record(
        &self,
        id: Uuid,
    ) -> Result<Option<PrivilegeRecord>, PrivilegeLookupError>;

    // --- Configuration ---
    async fn get_app_config(&self) -> Result<Vec<AppConfigEntry>, RepoError>;
    async fn upsert_app_config(&self, entries: &[ConfigUpsert]) -> Result<(), RepoError>;
    async fn get_company_config(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<CompanyConfigEntry>, RepoError>;
    async fn upsert_company_config(
        &self,
        company_id: Uuid,
        entries: &[ConfigUpsert],
    ) -> Result<(), RepoError>;

    // --- Rewards ---
    async fn list_rewards(&self) -> Result<Vec<Reward>, RepoError>;
    async fn create_reward(&self, req: CreateRewardRequest) -> Result<Reward, RepoError>;
    async fn update_reward(
        &self,
        id: Uuid,
        req: UpdateRewardRequest,
    ) -> Result<Option<Reward>, RepoError>;
    async fn delete_reward(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn set_reward_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Reward>, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// The pool authenticates as the provider's service role, so every query here runs
/// with elevated, direct store access. That makes every CRUD method super-admin-only
/// territory; the per-endpoint guard enforces that before any of these are reached.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COMPANY_COLUMNS: &str =
    "id, name, fmd_budget_per_year, employee_count, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, super_admin, company_id, account_type, created_at";
const REWARD_COLUMNS: &str = "id, partner_name, point_cost, description, stock_quantity, \
     image_url, is_active, priority, min_points_required, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_companies(&self) -> Result<Vec<Company>, RepoError> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    async fn get_company(&self, id: Uuid) -> Result<Option<Company>, RepoError> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, RepoError> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "INSERT INTO companies (id, name, fmd_budget_per_year, employee_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(req.fmd_budget_per_year)
        .bind(req.employee_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(company)
    }

    /// Uses COALESCE so only the fields present in the request are touched.
    async fn update_company(
        &self,
        id: Uuid,
        req: UpdateCompanyRequest,
    ) -> Result<Option<Company>, RepoError> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "UPDATE companies SET \
                name = COALESCE($2, name), \
                fmd_budget_per_year = COALESCE($3, fmd_budget_per_year), \
                employee_count = COALESCE($4, employee_count), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.fmd_budget_per_year)
        .bind(req.employee_count)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    async fn delete_company(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// list_users
    ///
    /// Optional company filter via QueryBuilder for safe parameterization.
    async fn list_users(&self, company_id: Option<Uuid>) -> Result<Vec<User>, RepoError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));

        if let Some(company) = company_id {
            builder.push(" AND company_id = ");
            builder.push_bind(company);
        }
        builder.push(" ORDER BY created_at DESC");

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                email = $2, first_name = $3, last_name = $4, role = $5, \
                super_admin = $6, account_type = $7, company_id = $8 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&req.email)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.role)
        .bind(req.super_admin)
        .bind(req.account_type)
        .bind(req.company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// assign_company_admin
    ///
    /// The provider mirrors new auth accounts into `public.users` via a trigger; the
    /// upsert covers both the mirrored-row and the trigger-lag case.
    async fn assign_company_admin(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, role, super_admin, company_id, account_type, created_at) \
             VALUES ($1, $2, $3, $4, 'admin', false, $5, 'b2b2c', NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                first_name = EXCLUDED.first_name, \
                last_name = EXCLUDED.last_name, \
                role = 'admin', \
                company_id = EXCLUDED.company_id, \
                account_type = 'b2b2c'",
        )
        .bind(user_id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(company_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// get_privilege_record
    ///
    /// The Authorization Guard's lookup. The flag column is decoded through
    /// `PrivilegeFlag::from_pg_row`, so the bool-or-string ambiguity stops here.
    async fn get_privilege_record(
        &self,
        id: Uuid,
    ) -> Result<Option<PrivilegeRecord>, PrivilegeLookupError> {
        let row = sqlx::query("SELECT id, super_admin, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let super_admin = PrivilegeFlag::from_pg_row(&row, "super_admin")
            .map_err(|e| PrivilegeLookupError::Malformed(e.to_string()))?;
        let role = row
            .try_get("role")
            .map_err(|e| PrivilegeLookupError::Malformed(e.to_string()))?;

        Ok(Some(PrivilegeRecord {
            id,
            super_admin,
            role,
        }))
    }

    async fn get_app_config(&self) -> Result<Vec<AppConfigEntry>, RepoError> {
        let entries = sqlx::query_as::<_, AppConfigEntry>(
            "SELECT key, value, description, updated_at FROM app_config ORDER BY key ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// upsert_app_config
    ///
    /// One upsert per key; config maps are tiny, so no batching is warranted.
    async fn upsert_app_config(&self, entries: &[ConfigUpsert]) -> Result<(), RepoError> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO app_config (key, value, updated_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(&entry.key)
            .bind(&entry.value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn get_company_config(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<CompanyConfigEntry>, RepoError> {
        let entries = sqlx::query_as::<_, CompanyConfigEntry>(
            "SELECT company_id, key, value, description, updated_at \
             FROM company_config WHERE company_id = $1 ORDER BY key ASC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn upsert_company_config(
        &self,
        company_id: Uuid,
        entries: &[ConfigUpsert],
    ) -> Result<(), RepoError> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO company_config (company_id, key, value, updated_at) \
                 VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (company_id, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(company_id)
            .bind(&entry.key)
            .bind(&entry.value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// list_rewards
    ///
    /// Catalog ordering: display priority first, newest entries second.
    async fn list_rewards(&self) -> Result<Vec<Reward>, RepoError> {
        let rewards = sqlx::query_as::<_, Reward>(&format!(
            "SELECT {REWARD_COLUMNS} FROM rewards ORDER BY priority DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rewards)
    }

    async fn create_reward(&self, req: CreateRewardRequest) -> Result<Reward, RepoError> {
        let reward = sqlx::query_as::<_, Reward>(&format!(
            "INSERT INTO rewards \
                (id, partner_name, point_cost, description, stock_quantity, image_url, \
                 is_active, priority, min_points_required, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW()) RETURNING {REWARD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&req.partner_name)
        .bind(req.point_cost)
        .bind(req.description)
        .bind(req.stock_quantity.unwrap_or(0))
        .bind(req.image_url)
        .bind(req.is_active.unwrap_or(true))
        .bind(req.priority.unwrap_or(0))
        .bind(req.min_points_required.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;
        Ok(reward)
    }

    /// Uses COALESCE for partial updates, only touching columns present in the request.
    async fn update_reward(
        &self,
        id: Uuid,
        req: UpdateRewardRequest,
    ) -> Result<Option<Reward>, RepoError> {
        let reward = sqlx::query_as::<_, Reward>(&format!(
            "UPDATE rewards SET \
                partner_name = COALESCE($2, partner_name), \
                point_cost = COALESCE($3, point_cost), \
                description = COALESCE($4, description), \
                stock_quantity = COALESCE($5, stock_quantity), \
                image_url = COALESCE($6, image_url), \
                is_active = COALESCE($7, is_active), \
                priority = COALESCE($8, priority), \
                min_points_required = COALESCE($9, min_points_required) \
             WHERE id = $1 RETURNING {REWARD_COLUMNS}"
        ))
        .bind(id)
        .bind(req.partner_name)
        .bind(req.point_cost)
        .bind(req.description)
        .bind(req.stock_quantity)
        .bind(req.image_url)
        .bind(req.is_active)
        .bind(req.priority)
        .bind(req.min_points_required)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reward)
    }

    async fn delete_reward(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM rewards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reward_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Reward>, RepoError> {
        let reward = sqlx::query_as::<_, Reward>(&format!(
            "UPDATE rewards SET is_active = $2 WHERE id = $1 RETURNING {REWARD_COLUMNS}"
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reward)
    }
}
