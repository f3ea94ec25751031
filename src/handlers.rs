use crate::{
    AppState,
    auth::CurrentSession,
    authz,
    error::ApiError,
    models::{
        AppConfigEntry, Company, CompanyConfigEntry, CompanyDetails, ConfigUpsert,
        CreateCompanyAdminRequest, CreateCompanyAdminResponse, CreateCompanyRequest,
        CreateRewardRequest, Reward, ToggleRewardRequest, UpdateCompanyRequest,
        UpdateRewardRequest, UpdateUserRequest, User,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

// --- Filter Structs ---

/// UserFilter
///
/// Accepted query parameters for the user listing endpoint (GET /api/users).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserFilter {
    /// Restrict the listing to one company's roster.
    pub company_id: Option<Uuid>,
}

/// Renders one value of a config PUT body as the stored string form: JSON strings
/// keep their content, everything else keeps its JSON rendering ("true", "3", ...).
fn stringify_config_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// --- Company Handlers ---

/// list_companies
///
/// [Admin API] Lists every enrolled company.
#[utoipa::path(
    get,
    path = "/api/companies",
    responses(
        (status = 200, description = "All companies", body = [Company]),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn list_companies(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Company>>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;
    Ok(Json(state.repo.list_companies().await?))
}

/// create_company
///
/// [Admin API] Enrolls a new company with its yearly FMD budget and headcount.
#[utoipa::path(
    post,
    path = "/api/companies",
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Created", body = Company),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn create_company(
    session: CurrentSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let company = state.repo.create_company(payload).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// get_company_details
///
/// [Admin API] The company detail screen payload: the company row, its user roster,
/// and its config overrides.
#[utoipa::path(
    get,
    path = "/api/companies/{id}",
    params(("id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company details", body = CompanyDetails),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_company_details(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyDetails>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    let Some(company) = state.repo.get_company(id).await? else {
        return Err(ApiError::NotFound("Company not found".to_string()));
    };
    let users = state.repo.list_users(Some(id)).await?;
    let config = state.repo.get_company_config(id).await?;

    Ok(Json(CompanyDetails {
        company,
        users,
        config,
    }))
}

/// update_company
///
/// [Admin API] Partial company update; omitted fields stay untouched.
#[utoipa::path(
    put,
    path = "/api/companies/{id}",
    params(("id" = Uuid, Path, description = "Company ID")),
    request_body = UpdateCompanyRequest,
    responses(
        (status = 200, description = "Updated", body = Company),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_company(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCompanyRequest>,
) -> Result<Json<Company>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    match state.repo.update_company(id, payload).await? {
        Some(company) => Ok(Json(company)),
        None => Err(ApiError::NotFound("Company not found".to_string())),
    }
}

/// delete_company
///
/// [Admin API] Removes a company. Dependent rows (config, user links) are handled
/// by the store's foreign-key actions.
#[utoipa::path(
    delete,
    path = "/api/companies/{id}",
    params(("id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_company(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if state.repo.delete_company(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Company not found".to_string()))
    }
}

/// create_company_admin
///
/// [Admin API] Provisions a company administrator account end to end: creates the
/// confirmed account at the auth provider, then upserts the mirrored profile row
/// (role admin, account type b2b2c, linked to the company). If the profile write
/// fails, the freshly created provider account is deleted so no orphan remains.
#[utoipa::path(
    post,
    path = "/api/companies/create-admin",
    request_body = CreateCompanyAdminRequest,
    responses(
        (status = 201, description = "Provisioned", body = CreateCompanyAdminResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn create_company_admin(
    session: CurrentSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateCompanyAdminRequest>,
) -> Result<(StatusCode, Json<CreateCompanyAdminResponse>), ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if payload.email.trim().is_empty()
        || payload.first_name.trim().is_empty()
        || payload.last_name.trim().is_empty()
    {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let user_id = state
        .auth_admin
        .create_user(
            &payload.email,
            &payload.password,
            &payload.first_name,
            &payload.last_name,
        )
        .await
        .map_err(|e| ApiError::Provider(e.to_string()))?;

    if let Err(e) = state
        .repo
        .assign_company_admin(
            user_id,
            payload.company_id,
            &payload.email,
            &payload.first_name,
            &payload.last_name,
        )
        .await
    {
        // Roll back the provider account so a retry starts clean.
        if let Err(cleanup) = state.auth_admin.delete_user(user_id).await {
            tracing::warn!(user = %user_id, "orphan cleanup after failed provisioning: {cleanup}");
        }
        return Err(e.into());
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateCompanyAdminResponse {
            success: true,
            user_id,
        }),
    ))
}

// --- User Handlers ---

/// list_users
///
/// [Admin API] Lists user profiles, optionally restricted to one company.
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Users", body = [User]),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn list_users(
    session: CurrentSession,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<User>>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;
    Ok(Json(state.repo.list_users(filter.company_id).await?))
}

/// update_user
///
/// [Admin API] Full-profile user update. An email change is propagated to the auth
/// provider; a propagation failure is logged but does not fail the request, since
/// the profile row is already the source of truth for this back-office.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Missing required fields"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let Some(existing) = state.repo.get_user(id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };
    let email_changed = existing.email != payload.email;
    let new_email = payload.email.clone();

    let Some(user) = state.repo.update_user(id, payload).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    if email_changed {
        if let Err(e) = state.auth_admin.update_user_email(id, &new_email).await {
            tracing::warn!(user = %id, "email propagation to auth provider failed: {e}");
        }
    }

    Ok(Json(user))
}

/// delete_user
///
/// [Admin API] Deletes a user through the auth provider; the mirrored profile row
/// follows via ON DELETE CASCADE. Super-admin rows are protected from deletion.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Cannot delete super-admin user"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    let Some(user) = state.repo.get_user(id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };
    if user.super_admin {
        return Err(ApiError::Forbidden(
            "Cannot delete super-admin user".to_string(),
        ));
    }

    state
        .auth_admin
        .delete_user(id)
        .await
        .map_err(|e| ApiError::Provider(e.to_string()))?;

    Ok(Json(json!({ "success": true })))
}

// --- Configuration Handlers ---

/// get_app_config
///
/// [Admin API] Lists the global platform configuration entries.
#[utoipa::path(
    get,
    path = "/api/app-config",
    responses(
        (status = 200, description = "Global configuration", body = [AppConfigEntry]),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn get_app_config(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<AppConfigEntry>>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;
    Ok(Json(state.repo.get_app_config().await?))
}

/// update_app_config
///
/// [Admin API] Upserts every key/value pair from the request body into the global
/// configuration table. Values are stored as strings.
#[utoipa::path(
    put,
    path = "/api/app-config",
    responses(
        (status = 200, description = "Upserted"),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn update_app_config(
    session: CurrentSession,
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    let entries: Vec<ConfigUpsert> = body
        .iter()
        .map(|(key, value)| ConfigUpsert {
            key: key.clone(),
            value: stringify_config_value(value),
        })
        .collect();

    state.repo.upsert_app_config(&entries).await?;
    Ok(Json(json!({ "success": true })))
}

/// get_company_config
///
/// [Admin API] Lists the config overrides of one company.
#[utoipa::path(
    get,
    path = "/api/companies/{id}/config",
    params(("id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company configuration", body = [CompanyConfigEntry]),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn get_company_config(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CompanyConfigEntry>>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;
    Ok(Json(state.repo.get_company_config(id).await?))
}

/// update_company_config
///
/// [Admin API] Upserts per-company config overrides. The `fmd_rate_per_km` key gets
/// special treatment: clamped to a non-negative value with two decimals, falling back
/// to "0.25" when unparseable. The consumer apps expect exactly that shape.
#[utoipa::path(
    put,
    path = "/api/companies/{id}/config",
    params(("id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Upserted"),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn update_company_config(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    let entries: Vec<ConfigUpsert> = body
        .iter()
        .map(|(key, value)| {
            let mut rendered = stringify_config_value(value);
            if key == "fmd_rate_per_km" {
                rendered = match rendered.parse::<f64>() {
                    Ok(rate) if rate >= 0.0 => format!("{rate:.2}"),
                    _ => "0.25".to_string(),
                };
            }
            ConfigUpsert {
                key: key.clone(),
                value: rendered,
            }
        })
        .collect();

    state.repo.upsert_company_config(id, &entries).await?;
    Ok(Json(json!({ "success": true })))
}

// --- Reward Handlers ---

/// list_rewards
///
/// [Admin API] Lists the full rewards catalog, inactive entries included.
#[utoipa::path(
    get,
    path = "/api/rewards",
    responses(
        (status = 200, description = "Rewards", body = [Reward]),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn list_rewards(
    session: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Reward>>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;
    Ok(Json(state.repo.list_rewards().await?))
}

/// create_reward
///
/// [Admin API] Adds a catalog entry. Point cost and stock must be non-negative.
#[utoipa::path(
    post,
    path = "/api/rewards",
    request_body = CreateRewardRequest,
    responses(
        (status = 201, description = "Created", body = Reward),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Not a super-admin")
    )
)]
pub async fn create_reward(
    session: CurrentSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateRewardRequest>,
) -> Result<(StatusCode, Json<Reward>), ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if payload.partner_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Partner name and point cost are required".to_string(),
        ));
    }
    if payload.point_cost < 0 {
        return Err(ApiError::BadRequest(
            "Point cost must be positive".to_string(),
        ));
    }
    if payload.stock_quantity.is_some_and(|qty| qty < 0) {
        return Err(ApiError::BadRequest(
            "Stock quantity must be positive".to_string(),
        ));
    }

    let reward = state.repo.create_reward(payload).await?;
    Ok((StatusCode::CREATED, Json(reward)))
}

/// update_reward
///
/// [Admin API] Partial catalog entry update, same validation as creation.
#[utoipa::path(
    put,
    path = "/api/rewards/{id}",
    params(("id" = Uuid, Path, description = "Reward ID")),
    request_body = UpdateRewardRequest,
    responses(
        (status = 200, description = "Updated", body = Reward),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_reward(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRewardRequest>,
) -> Result<Json<Reward>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if payload.point_cost.is_some_and(|cost| cost < 0) {
        return Err(ApiError::BadRequest(
            "Point cost must be positive".to_string(),
        ));
    }
    if payload.stock_quantity.is_some_and(|qty| qty < 0) {
        return Err(ApiError::BadRequest(
            "Stock quantity must be positive".to_string(),
        ));
    }

    match state.repo.update_reward(id, payload).await? {
        Some(reward) => Ok(Json(reward)),
        None => Err(ApiError::NotFound("Reward not found".to_string())),
    }
}

/// delete_reward
///
/// [Admin API] Removes a catalog entry.
#[utoipa::path(
    delete,
    path = "/api/rewards/{id}",
    params(("id" = Uuid, Path, description = "Reward ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_reward(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    if state.repo.delete_reward(id).await? {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::NotFound("Reward not found".to_string()))
    }
}

/// toggle_reward
///
/// [Admin API] Flips a catalog entry's visibility. The body must carry a real
/// boolean `is_active`; anything else is rejected at deserialization.
#[utoipa::path(
    patch,
    path = "/api/rewards/{id}/toggle",
    params(("id" = Uuid, Path, description = "Reward ID")),
    request_body = ToggleRewardRequest,
    responses(
        (status = 200, description = "Toggled", body = Reward),
        (status = 404, description = "Not Found")
    )
)]
pub async fn toggle_reward(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleRewardRequest>,
) -> Result<Json<Reward>, ApiError> {
    authz::require_super_admin(&state.repo, session.principal.as_ref()).await?;

    match state.repo.set_reward_active(id, payload.is_active).await? {
        Some(reward) => Ok(Json(reward)),
        None => Err(ApiError::NotFound("Reward not found".to_string())),
    }
}
