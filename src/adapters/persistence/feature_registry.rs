use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::policy_admin::{
        CreateFeatureInput, FeatureRegistryRepo, UpdateFeatureInput,
    },
    domain::entities::feature_registry::FeatureRegistryEntry,
};

fn row_to_feature(row: &PgRow) -> FeatureRegistryEntry {
    FeatureRegistryEntry {
        id: row.get("id"),
        key: row.get("key"),
        category: row.get("category"),
        minimum_plan: row.get("minimum_plan"),
        requires_active_subscription: row.get("requires_active_subscription"),
        requires_publishing_capability: row.get("requires_publishing_capability"),
        visible_in_trial: row.get("visible_in_trial"),
        usable_in_trial: row.get("usable_in_trial"),
        enabled: row.get("enabled"),
        default_for_new_dpps: row.get("default_for_new_dpps"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, key, category, minimum_plan, requires_active_subscription,
    requires_publishing_capability, visible_in_trial, usable_in_trial,
    enabled, default_for_new_dpps, created_at, updated_at
"#;

#[async_trait]
impl FeatureRegistryRepo for PostgresPersistence {
    async fn list(&self) -> AppResult<Vec<FeatureRegistryEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM feature_registry ORDER BY category, key",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_feature).collect())
    }

    async fn list_enabled(&self) -> AppResult<Vec<FeatureRegistryEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM feature_registry WHERE enabled = TRUE ORDER BY category, key",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_feature).collect())
    }

    async fn get_by_key(&self, key: &str) -> AppResult<Option<FeatureRegistryEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM feature_registry WHERE key = $1",
            SELECT_COLS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_feature))
    }

    async fn create(&self, input: &CreateFeatureInput) -> AppResult<FeatureRegistryEntry> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO feature_registry (
                key, category, minimum_plan, requires_active_subscription,
                requires_publishing_capability, visible_in_trial,
                usable_in_trial, enabled, default_for_new_dpps
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&input.key)
        .bind(&input.category)
        .bind(input.minimum_plan)
        .bind(input.requires_active_subscription)
        .bind(input.requires_publishing_capability)
        .bind(input.visible_in_trial)
        .bind(input.usable_in_trial)
        .bind(input.enabled)
        .bind(input.default_for_new_dpps)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_feature(&row))
    }

    async fn update(&self, id: Uuid, input: &UpdateFeatureInput) -> AppResult<FeatureRegistryEntry> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE feature_registry
            SET category = COALESCE($2, category),
                minimum_plan = COALESCE($3, minimum_plan),
                requires_active_subscription = COALESCE($4, requires_active_subscription),
                requires_publishing_capability = COALESCE($5, requires_publishing_capability),
                visible_in_trial = COALESCE($6, visible_in_trial),
                usable_in_trial = COALESCE($7, usable_in_trial),
                enabled = COALESCE($8, enabled),
                default_for_new_dpps = COALESCE($9, default_for_new_dpps),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.category)
        .bind(input.minimum_plan)
        .bind(input.requires_active_subscription)
        .bind(input.requires_publishing_capability)
        .bind(input.visible_in_trial)
        .bind(input.usable_in_trial)
        .bind(input.enabled)
        .bind(input.default_for_new_dpps)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;
        Ok(row_to_feature(&row))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM feature_registry WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
