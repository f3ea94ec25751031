#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use fmd_backoffice::{
    AppConfig, AppState, MockAuthAdmin, MockSessionResolver, create_router,
    authz::{PrivilegeFlag, PrivilegeRecord},
    error::{PrivilegeLookupError, RepoError},
    models::{
        AccountType, AppConfigEntry, CoarseRole, Company, CompanyConfigEntry, ConfigUpsert,
        CreateCompanyRequest, CreateRewardRequest, Reward, UpdateCompanyRequest,
        UpdateRewardRequest, UpdateUserRequest, User,
    },
    provider::AuthAdminState,
    repository::{Repository, RepositoryState},
    SessionState,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Handlers and the gate depend on the Repository trait only, so the whole stack can
// run against this in-memory implementation with no database.
pub struct MockRepository {
    pub companies: Mutex<Vec<Company>>,
    pub users: Mutex<Vec<User>>,
    pub privileges: Mutex<HashMap<Uuid, PrivilegeRecord>>,
    pub app_config: Mutex<Vec<AppConfigEntry>>,
    pub company_config: Mutex<Vec<CompanyConfigEntry>>,
    pub rewards: Mutex<Vec<Reward>>,
    // Records (user_id, company_id) pairs so tests can verify the profile upsert.
    pub assigned_admins: Mutex<Vec<(Uuid, Uuid)>>,
    pub fail_assign_admin: bool,
    pub fail_privilege_lookup: bool,
}

impl Default for MockRepository {
    fn default() -> Self {
        MockRepository {
            companies: Mutex::new(vec![]),
            users: Mutex::new(vec![]),
            privileges: Mutex::new(HashMap::new()),
            app_config: Mutex::new(vec![]),
            company_config: Mutex::new(vec![]),
            rewards: Mutex::new(vec![]),
            assigned_admins: Mutex::new(vec![]),
            fail_assign_admin: false,
            fail_privilege_lookup: false,
        }
    }
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user whose privilege row carries the given raw flag value.
    pub fn with_flag(self, id: Uuid, flag: PrivilegeFlag) -> Self {
        let elevated = flag.is_elevated();
        self.users.lock().unwrap().push(User {
            id,
            email: format!("{id}@test.com"),
            role: if elevated {
                CoarseRole::Admin
            } else {
                CoarseRole::Employee
            },
            super_admin: elevated,
            account_type: AccountType::B2c,
            ..Default::default()
        });
        self.privileges.lock().unwrap().insert(
            id,
            PrivilegeRecord {
                id,
                super_admin: flag,
                role: if elevated {
                    CoarseRole::Admin
                } else {
                    CoarseRole::Employee
                },
            },
        );
        self
    }

    /// Seeds a user holding the super-admin privilege.
    pub fn with_privileged_user(self, id: Uuid) -> Self {
        self.with_flag(id, PrivilegeFlag::Boolean(true))
    }

    /// Seeds an authenticated but unprivileged user.
    pub fn with_plain_user(self, id: Uuid) -> Self {
        self.with_flag(id, PrivilegeFlag::Boolean(false))
    }

    pub fn with_company(self, company: Company) -> Self {
        self.companies.lock().unwrap().push(company);
        self
    }

    pub fn with_reward(self, reward: Reward) -> Self {
        self.rewards.lock().unwrap().push(reward);
        self
    }

    pub fn failing_assign_admin(mut self) -> Self {
        self.fail_assign_admin = true;
        self
    }

    pub fn failing_privilege_lookup(mut self) -> Self {
        self.fail_privilege_lookup = true;
        self
    }

    /// Rewrites a stored privilege flag, simulating revocation mid-session.
    pub fn set_privilege(&self, id: Uuid, flag: PrivilegeFlag) {
        if let Some(record) = self.privileges.lock().unwrap().get_mut(&id) {
            record.super_admin = flag;
        }
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn list_companies(&self) -> Result<Vec<Company>, RepoError> {
        let mut companies = self.companies.lock().unwrap().clone();
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(companies)
    }

    async fn get_company(&self, id: Uuid) -> Result<Option<Company>, RepoError> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, RepoError> {
        let company = Company {
            id: Uuid::new_v4(),
            name: req.name,
            fmd_budget_per_year: req.fmd_budget_per_year,
            employee_count: req.employee_count,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.companies.lock().unwrap().push(company.clone());
        Ok(company)
    }

    async fn update_company(
        &self,
        id: Uuid,
        req: UpdateCompanyRequest,
    ) -> Result<Option<Company>, RepoError> {
        let mut companies = self.companies.lock().unwrap();
        let Some(company) = companies.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            company.name = name;
        }
        if let Some(budget) = req.fmd_budget_per_year {
            company.fmd_budget_per_year = budget;
        }
        if let Some(count) = req.employee_count {
            company.employee_count = count;
        }
        company.updated_at = Utc::now();
        Ok(Some(company.clone()))
    }

    async fn delete_company(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut companies = self.companies.lock().unwrap();
        let before = companies.len();
        companies.retain(|c| c.id != id);
        Ok(companies.len() < before)
    }

    async fn list_users(&self, company_id: Option<Uuid>) -> Result<Vec<User>, RepoError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| company_id.is_none() || u.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.email = req.email;
        user.first_name = req.first_name;
        user.last_name = req.last_name;
        user.role = req.role;
        user.super_admin = req.super_admin;
        user.account_type = req.account_type;
        user.company_id = req.company_id;
        let updated = user.clone();
        drop(users);
        // Keep the privilege row in step with the profile row, like the real store.
        self.privileges.lock().unwrap().insert(
            id,
            PrivilegeRecord {
                id,
                super_admin: PrivilegeFlag::Boolean(updated.super_admin),
                role: updated.role,
            },
        );
        Ok(Some(updated))
    }

    async fn assign_company_admin(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepoError> {
        if self.fail_assign_admin {
            return Err(RepoError(sqlx::Error::RowNotFound));
        }
        self.assigned_admins
            .lock()
            .unwrap()
            .push((user_id, company_id));
        self.users.lock().unwrap().push(User {
            id: user_id,
            email: email.to_string(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            role: CoarseRole::Admin,
            super_admin: false,
            company_id: Some(company_id),
            account_type: AccountType::B2b2c,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_privilege_record(
        &self,
        id: Uuid,
    ) -> Result<Option<PrivilegeRecord>, PrivilegeLookupError> {
        if self.fail_privilege_lookup {
            return Err(PrivilegeLookupError::Malformed(
                "simulated lookup failure".to_string(),
            ));
        }
        Ok(self.privileges.lock().unwrap().get(&id).cloned())
    }

    async fn get_app_config(&self) -> Result<Vec<AppConfigEntry>, RepoError> {
        Ok(self.app_config.lock().unwrap().clone())
    }

    async fn upsert_app_config(&self, entries: &[ConfigUpsert]) -> Result<(), RepoError> {
        let mut config = self.app_config.lock().unwrap();
        for entry in entries {
            match config.iter_mut().find(|e| e.key == entry.key) {
                Some(existing) => existing.value = entry.value.clone(),
                None => config.push(AppConfigEntry {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    description: None,
                    updated_at: Utc::now(),
                }),
            }
        }
        Ok(())
    }

    async fn get_company_config(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<CompanyConfigEntry>, RepoError> {
        Ok(self
            .company_config
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn upsert_company_config(
        &self,
        company_id: Uuid,
        entries: &[ConfigUpsert],
    ) -> Result<(), RepoError> {
        let mut config = self.company_config.lock().unwrap();
        for entry in entries {
            match config
                .iter_mut()
                .find(|e| e.company_id == company_id && e.key == entry.key)
            {
                Some(existing) => existing.value = entry.value.clone(),
                None => config.push(CompanyConfigEntry {
                    company_id,
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    description: None,
                    updated_at: Utc::now(),
                }),
            }
        }
        Ok(())
    }

    async fn list_rewards(&self) -> Result<Vec<Reward>, RepoError> {
        let mut rewards = self.rewards.lock().unwrap().clone();
        rewards.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rewards)
    }

    async fn create_reward(&self, req: CreateRewardRequest) -> Result<Reward, RepoError> {
        let reward = Reward {
            id: Uuid::new_v4(),
            partner_name: req.partner_name,
            point_cost: req.point_cost,
            description: req.description,
            stock_quantity: req.stock_quantity.unwrap_or(0),
            image_url: req.image_url,
            is_active: req.is_active.unwrap_or(true),
            priority: req.priority.unwrap_or(0),
            min_points_required: req.min_points_required.unwrap_or(0),
            created_at: Utc::now(),
        };
        self.rewards.lock().unwrap().push(reward.clone());
        Ok(reward)
    }

    async fn update_reward(
        &self,
        id: Uuid,
        req: UpdateRewardRequest,
    ) -> Result<Option<Reward>, RepoError> {
        let mut rewards = self.rewards.lock().unwrap();
        let Some(reward) = rewards.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.partner_name {
            reward.partner_name = name;
        }
        if let Some(cost) = req.point_cost {
            reward.point_cost = cost;
        }
        if let Some(description) = req.description {
            reward.description = Some(description);
        }
        if let Some(qty) = req.stock_quantity {
            reward.stock_quantity = qty;
        }
        if let Some(url) = req.image_url {
            reward.image_url = Some(url);
        }
        if let Some(active) = req.is_active {
            reward.is_active = active;
        }
        if let Some(priority) = req.priority {
            reward.priority = priority;
        }
        if let Some(min) = req.min_points_required {
            reward.min_points_required = min;
        }
        Ok(Some(reward.clone()))
    }

    async fn delete_reward(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut rewards = self.rewards.lock().unwrap();
        let before = rewards.len();
        rewards.retain(|r| r.id != id);
        Ok(rewards.len() < before)
    }

    async fn set_reward_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Reward>, RepoError> {
        let mut rewards = self.rewards.lock().unwrap();
        let Some(reward) = rewards.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        reward.is_active = is_active;
        Ok(Some(reward.clone()))
    }
}

// --- TEST APP SCAFFOLDING ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MockRepository>,
    pub auth: Arc<MockAuthAdmin>,
}

/// Spawns the full router (gate included) on an ephemeral port, backed entirely by
/// in-process mocks. Returns handles to the mocks so tests can assert side effects.
pub async fn spawn_app(
    repo: MockRepository,
    session: MockSessionResolver,
    auth: MockAuthAdmin,
) -> TestApp {
    let repo = Arc::new(repo);
    let auth = Arc::new(auth);

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        session: Arc::new(session) as SessionState,
        auth_admin: auth.clone() as AuthAdminState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        auth,
    }
}

/// Cookie header value carrying a session access token.
pub fn session_cookie(token: &str) -> String {
    format!("sb-access-token={token}")
}

/// HTTP client that surfaces redirects instead of following them.
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
