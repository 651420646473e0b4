use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::audit_log::insert_audit_log,
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::audit::NewAuditLog,
    application::use_cases::tenant_permissions::MembershipRepo,
    domain::entities::membership::{Membership, OrgRole},
};

fn row_to_membership(row: &PgRow) -> Membership {
    Membership {
        id: row.get("id"),
        user_id: row.get("user_id"),
        organization_id: row.get("organization_id"),
        role: row.get("role"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = "id, user_id, organization_id, role, created_at";

#[async_trait]
impl MembershipRepo for PostgresPersistence {
    async fn get(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<Option<Membership>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE user_id = $1 AND organization_id = $2",
            SELECT_COLS
        ))
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_membership))
    }

    async fn list_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Membership>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE organization_id = $1 ORDER BY created_at ASC",
            SELECT_COLS
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_membership).collect())
    }

    async fn delete_with_audit(&self, id: Uuid, audit: &NewAuditLog) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let result = sqlx::query("DELETE FROM memberships WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        insert_audit_log(&mut *tx, audit)
            .await
            .map_err(AppError::from)?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn update_role_with_audit(
        &self,
        id: Uuid,
        role: OrgRole,
        audit: &NewAuditLog,
    ) -> AppResult<Membership> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let row = sqlx::query(&format!(
            "UPDATE memberships SET role = $2 WHERE id = $1 RETURNING {}",
            SELECT_COLS
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;
        insert_audit_log(&mut *tx, audit)
            .await
            .map_err(AppError::from)?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_membership(&row))
    }
}
