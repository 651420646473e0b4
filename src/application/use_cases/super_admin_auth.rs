use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::jwt::{issue_super_admin, verify_super_admin};
use crate::application::ports::clock::Clock;
use crate::domain::entities::super_admin::{SuperAdmin, SuperAdminSession};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait SuperAdminRepo: Send + Sync {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<SuperAdmin>>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SuperAdmin>>;

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
pub trait SuperAdminSessionRepo: Send + Sync {
    async fn create(&self, session: &NewSuperAdminSession) -> AppResult<SuperAdminSession>;

    async fn get_by_token_hash(&self, token_hash: &str) -> AppResult<Option<SuperAdminSession>>;

    async fn delete_by_token_hash(&self, token_hash: &str) -> AppResult<()>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

#[derive(Debug, Clone)]
pub struct NewSuperAdminSession {
    pub super_admin_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ============================================================================
// Hashing
// ============================================================================

/// Salted SHA-256, hex encoded. The salt is stored per admin.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub admin: SuperAdmin,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
    pub admin: SuperAdmin,
    pub session: SuperAdminSession,
}

#[derive(Clone)]
pub struct SuperAdminAuthUseCases {
    admins: Arc<dyn SuperAdminRepo>,
    sessions: Arc<dyn SuperAdminSessionRepo>,
    clock: Arc<dyn Clock>,
    jwt_secret: SecretString,
    session_ttl: Duration,
}

impl SuperAdminAuthUseCases {
    pub fn new(
        admins: Arc<dyn SuperAdminRepo>,
        sessions: Arc<dyn SuperAdminSessionRepo>,
        clock: Arc<dyn Clock>,
        jwt_secret: SecretString,
        session_ttl: Duration,
    ) -> Self {
        Self {
            admins,
            sessions,
            clock,
            jwt_secret,
            session_ttl,
        }
    }

    /// Authenticate and open a session. The returned JWT carries the raw
    /// session token; only its hash is stored.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<LoginResult> {
        let email = email.trim().to_lowercase();
        let admin = self
            .admins
            .get_by_email(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !admin.is_active {
            return Err(AppError::Unauthorized);
        }
        if hash_password(&admin.password_salt, password) != admin.password_hash {
            return Err(AppError::Unauthorized);
        }

        let now = self.clock.now();
        let session_token = generate_session_token();
        let session = NewSuperAdminSession {
            super_admin_id: admin.id,
            token_hash: hash_session_token(&session_token),
            expires_at: now + self.session_ttl,
            ip_address,
            user_agent,
        };
        self.sessions.create(&session).await?;
        self.admins.update_last_login(admin.id, now).await?;

        let token = issue_super_admin(
            admin.id,
            admin.role,
            &session_token,
            &self.jwt_secret,
            time::Duration::seconds(self.session_ttl.num_seconds()),
        )?;
        Ok(LoginResult { token, admin })
    }

    /// Validate a bearer token. The role comes from the database row, not the
    /// JWT claim, so a role change takes effect on the next request.
    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: &str) -> AppResult<AuthenticatedAdmin> {
        let claims = verify_super_admin(token, &self.jwt_secret)?;
        let session = self
            .sessions
            .get_by_token_hash(&hash_session_token(&claims.session_id))
            .await?
            .ok_or(AppError::Unauthorized)?;
        if session.expires_at <= self.clock.now() {
            return Err(AppError::Unauthorized);
        }
        let admin = self
            .admins
            .get_by_id(session.super_admin_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !admin.is_active {
            return Err(AppError::Unauthorized);
        }
        Ok(AuthenticatedAdmin { admin, session })
    }

    /// Logout never fails: invalid tokens and storage errors both end with
    /// the client logged out.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) {
        let claims = match verify_super_admin(token, &self.jwt_secret) {
            Ok(c) => c,
            Err(_) => return,
        };
        if let Err(err) = self
            .sessions
            .delete_by_token_hash(&hash_session_token(&claims.session_id))
            .await
        {
            warn!(error = %err, "failed to delete super admin session on logout");
        }
    }

    /// Drop sessions past their expiry. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn purge_expired_sessions(&self) -> AppResult<u64> {
        self.sessions.delete_expired(self.clock.now()).await
    }
}
