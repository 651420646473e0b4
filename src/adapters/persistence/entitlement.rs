use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::policy_admin::EntitlementCatalogRepo,
    domain::entities::entitlement::{Entitlement, EntitlementKind, PlanEntitlement},
};

fn row_to_entitlement(row: &PgRow) -> Entitlement {
    Entitlement {
        id: row.get("id"),
        key: row.get("key"),
        kind: row.get("kind"),
        unit: row.get("unit"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_plan_entitlement(row: &PgRow) -> PlanEntitlement {
    PlanEntitlement {
        id: row.get("id"),
        pricing_plan_id: row.get("pricing_plan_id"),
        entitlement_key: row.get("entitlement_key"),
        value: row.get("value"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = "id, key, kind, unit, created_at, updated_at";
const PLAN_VALUE_COLS: &str = "id, pricing_plan_id, entitlement_key, value, created_at";

#[async_trait]
impl EntitlementCatalogRepo for PostgresPersistence {
    async fn list(&self) -> AppResult<Vec<Entitlement>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entitlements ORDER BY key",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_entitlement).collect())
    }

    async fn get_by_key(&self, key: &str) -> AppResult<Option<Entitlement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entitlements WHERE key = $1",
            SELECT_COLS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_entitlement))
    }

    async fn create(
        &self,
        key: &str,
        kind: EntitlementKind,
        unit: Option<&str>,
    ) -> AppResult<Entitlement> {
        let row = sqlx::query(&format!(
            "INSERT INTO entitlements (key, kind, unit) VALUES ($1, $2, $3) RETURNING {}",
            SELECT_COLS
        ))
        .bind(key)
        .bind(kind)
        .bind(unit)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_entitlement(&row))
    }

    async fn upsert_plan_value(
        &self,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
        value: &serde_json::Value,
    ) -> AppResult<PlanEntitlement> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO plan_entitlements (pricing_plan_id, entitlement_key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (pricing_plan_id, entitlement_key)
            DO UPDATE SET value = EXCLUDED.value
            RETURNING {}
            "#,
            PLAN_VALUE_COLS
        ))
        .bind(pricing_plan_id)
        .bind(entitlement_key)
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_plan_entitlement(&row))
    }

    async fn get_plan_value(
        &self,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
    ) -> AppResult<Option<PlanEntitlement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plan_entitlements WHERE pricing_plan_id = $1 AND entitlement_key = $2",
            PLAN_VALUE_COLS
        ))
        .bind(pricing_plan_id)
        .bind(entitlement_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan_entitlement))
    }

    async fn list_plan_values(&self, pricing_plan_id: Uuid) -> AppResult<Vec<PlanEntitlement>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plan_entitlements WHERE pricing_plan_id = $1 ORDER BY entitlement_key",
            PLAN_VALUE_COLS
        ))
        .bind(pricing_plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_plan_entitlement).collect())
    }
}
