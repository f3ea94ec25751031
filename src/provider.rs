use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{
        ACCESS_COOKIE, Claims, Principal, REFRESH_COOKIE, ResolvedSession, SessionResolver,
        SessionTokens,
    },
    config::AppConfig,
    error::AuthProviderError,
};

/// AuthAdmin
///
/// Administrative operations against the hosted auth provider, used only by the CRUD
/// handlers (never by the gating core). Runs with the service-role key.
#[async_trait]
pub trait AuthAdmin: Send + Sync {
    /// Provisions a confirmed account and returns the provider-assigned user id.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Uuid, AuthProviderError>;

    /// Deletes the account; the mirrored profile row goes with it (ON DELETE CASCADE).
    async fn delete_user(&self, id: Uuid) -> Result<(), AuthProviderError>;

    /// Propagates an email change from the profile table into the provider's records.
    async fn update_user_email(&self, id: Uuid, email: &str) -> Result<(), AuthProviderError>;
}

/// AuthAdminState
///
/// The concrete type used to share the provider admin client across the application state.
pub type AuthAdminState = Arc<dyn AuthAdmin>;

/// Minimal shape of the GoTrue token-refresh response.
#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Minimal shape of the GoTrue admin create-user response.
#[derive(Deserialize)]
struct AdminUserResponse {
    id: Uuid,
}

/// SupabaseAuth
///
/// The real provider client. Session validation follows the provider's documented
/// server-side path: the HS256 access token is verified locally against the shared
/// project secret, and only an expired-but-refreshable session costs an HTTP round
/// trip (the single provider call the resolver is allowed per request). Admin
/// operations hit the GoTrue admin API with the service-role key.
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: String,
    jwt_secret: String,
}

impl SupabaseAuth {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.auth_url.trim_end_matches('/').to_string(),
            anon_key: config.auth_anon_key.clone(),
            service_key: config.auth_service_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    /// Decodes and validates an access token, returning its claims.
    fn decode_access_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        // Expiry must always be checked; the refresh path relies on it.
        validation.validate_exp = true;
        // GoTrue sets aud to "authenticated"; we key validation on exp + signature only.
        validation.validate_aud = false;
        decode::<Claims>(token, &decoding_key, &validation).map(|data| data.claims)
    }

    /// Exchanges the refresh token for a fresh pair. One call, no retries.
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AuthProviderError> {
        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthProviderError::Rejected { status, body });
        }

        let tokens = response.json::<RefreshResponse>().await?;
        Ok(SessionTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn try_resolve(&self, jar: &CookieJar) -> Result<ResolvedSession, AuthProviderError> {
        if let Some(cookie) = jar.get(ACCESS_COOKIE) {
            match self.decode_access_token(cookie.value()) {
                Ok(claims) => return Ok(ResolvedSession::authenticated(claims.sub)),
                // Expired is the one recoverable case: fall through to the refresh path.
                Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {}
                // Bad signature, malformed token, wrong algorithm: unauthenticated.
                Err(e) => return Err(AuthProviderError::InvalidToken(e)),
            }
        }

        let Some(refresh_cookie) = jar.get(REFRESH_COOKIE) else {
            return Err(AuthProviderError::MissingCredentials);
        };

        let tokens = self.refresh_session(refresh_cookie.value()).await?;
        let claims = self
            .decode_access_token(&tokens.access_token)
            .map_err(AuthProviderError::InvalidToken)?;

        Ok(ResolvedSession {
            principal: Some(Principal { id: claims.sub }),
            refreshed: Some(tokens),
        })
    }
}

#[async_trait]
impl SessionResolver for SupabaseAuth {
    /// resolve
    ///
    /// The Session Resolver contract: any failure (missing cookies, tampered token,
    /// network error, rejected refresh) degrades to anonymous. Never an error, never
    /// authenticated-by-default.
    async fn resolve(&self, jar: &CookieJar) -> ResolvedSession {
        match self.try_resolve(jar).await {
            Ok(session) => session,
            Err(AuthProviderError::MissingCredentials) => ResolvedSession::anonymous(),
            Err(e) => {
                tracing::debug!("session resolution failed, treating as anonymous: {e}");
                ResolvedSession::anonymous()
            }
        }
    }
}

#[async_trait]
impl AuthAdmin for SupabaseAuth {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Uuid, AuthProviderError> {
        let url = format!("{}/auth/v1/admin/users", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                // Auto-confirm: back-office provisioned accounts skip the signup email.
                "email_confirm": true,
                "user_metadata": {
                    "first_name": first_name,
                    "last_name": last_name,
                    "role": "admin",
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthProviderError::Rejected { status, body });
        }

        let user = response.json::<AdminUserResponse>().await?;
        Ok(user.id)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AuthProviderError> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, id);
        let response = self
            .http
            .delete(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthProviderError::Rejected { status, body });
        }
        Ok(())
    }

    async fn update_user_email(&self, id: Uuid, email: &str) -> Result<(), AuthProviderError> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, id);
        let response = self
            .http
            .put(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthProviderError::Rejected { status, body });
        }
        Ok(())
    }
}

/// MockAuthAdmin
///
/// A recording mock of the provider admin API used by the integration tests. Lets
/// tests assert that provisioning, deletion, and email propagation actually reached
/// the provider boundary (or that cleanup happened) without any network traffic.
#[derive(Default)]
pub struct MockAuthAdmin {
    pub next_user_id: Mutex<Option<Uuid>>,
    pub created: Mutex<Vec<(Uuid, String)>>,
    pub deleted: Mutex<Vec<Uuid>>,
    pub email_updates: Mutex<Vec<(Uuid, String)>>,
}

impl MockAuthAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the id the next `create_user` call hands back.
    pub fn with_next_user_id(self, id: Uuid) -> Self {
        *self.next_user_id.lock().unwrap() = Some(id);
        self
    }
}

#[async_trait]
impl AuthAdmin for MockAuthAdmin {
    async fn create_user(
        &self,
        email: &str,
        _password: &str,
        _first_name: &str,
        _last_name: &str,
    ) -> Result<Uuid, AuthProviderError> {
        let id = self
            .next_user_id
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(Uuid::new_v4);
        self.created.lock().unwrap().push((id, email.to_string()));
        Ok(id)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AuthProviderError> {
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }

    async fn update_user_email(&self, id: Uuid, email: &str) -> Result<(), AuthProviderError> {
        self.email_updates
            .lock()
            .unwrap()
            .push((id, email.to_string()));
        Ok(())
    }
}
