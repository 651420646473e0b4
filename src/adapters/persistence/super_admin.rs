use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::super_admin_auth::{
        NewSuperAdminSession, SuperAdminRepo, SuperAdminSessionRepo,
    },
    domain::entities::super_admin::{SuperAdmin, SuperAdminSession},
};

fn row_to_super_admin(row: &PgRow) -> SuperAdmin {
    SuperAdmin {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_salt: row.get("password_salt"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        is_active: row.get("is_active"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    }
}

fn row_to_session(row: &PgRow) -> SuperAdminSession {
    SuperAdminSession {
        id: row.get("id"),
        super_admin_id: row.get("super_admin_id"),
        token_hash: row.get("token_hash"),
        expires_at: row.get("expires_at"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    }
}

const ADMIN_COLS: &str = r#"
    id, email, name, password_salt, password_hash, role, is_active,
    last_login_at, created_at
"#;
const SESSION_COLS: &str = r#"
    id, super_admin_id, token_hash, expires_at, ip_address, user_agent,
    created_at
"#;

#[async_trait]
impl SuperAdminRepo for PostgresPersistence {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<SuperAdmin>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM super_admins WHERE LOWER(email) = LOWER($1)",
            ADMIN_COLS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_super_admin))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SuperAdmin>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM super_admins WHERE id = $1",
            ADMIN_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_super_admin))
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE super_admins SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

#[async_trait]
impl SuperAdminSessionRepo for PostgresPersistence {
    async fn create(&self, session: &NewSuperAdminSession) -> AppResult<SuperAdminSession> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO super_admin_sessions (
                super_admin_id, token_hash, expires_at, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SESSION_COLS
        ))
        .bind(session.super_admin_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_session(&row))
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> AppResult<Option<SuperAdminSession>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM super_admin_sessions WHERE token_hash = $1",
            SESSION_COLS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_session))
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM super_admin_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM super_admin_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
