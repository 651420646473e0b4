use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::policy_admin::TrialOverrideRepo,
    domain::entities::trial_override::{TrialEntitlementOverride, TrialFeatureOverride},
};

fn row_to_feature_override(row: &PgRow) -> TrialFeatureOverride {
    TrialFeatureOverride {
        id: row.get("id"),
        subscription_model_id: row.get("subscription_model_id"),
        feature_key: row.get("feature_key"),
        enabled: row.get("enabled"),
        created_at: row.get("created_at"),
    }
}

fn row_to_entitlement_override(row: &PgRow) -> TrialEntitlementOverride {
    TrialEntitlementOverride {
        id: row.get("id"),
        subscription_model_id: row.get("subscription_model_id"),
        entitlement_key: row.get("entitlement_key"),
        value: row.get("value"),
        created_at: row.get("created_at"),
    }
}

const FEATURE_COLS: &str = "id, subscription_model_id, feature_key, enabled, created_at";
const ENTITLEMENT_COLS: &str = "id, subscription_model_id, entitlement_key, value, created_at";

#[async_trait]
impl TrialOverrideRepo for PostgresPersistence {
    async fn get_feature_override(
        &self,
        subscription_model_id: Uuid,
        feature_key: &str,
    ) -> AppResult<Option<TrialFeatureOverride>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM trial_feature_overrides WHERE subscription_model_id = $1 AND feature_key = $2",
            FEATURE_COLS
        ))
        .bind(subscription_model_id)
        .bind(feature_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_feature_override))
    }

    async fn get_entitlement_override(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
    ) -> AppResult<Option<TrialEntitlementOverride>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM trial_entitlement_overrides WHERE subscription_model_id = $1 AND entitlement_key = $2",
            ENTITLEMENT_COLS
        ))
        .bind(subscription_model_id)
        .bind(entitlement_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_entitlement_override))
    }

    async fn list_feature_overrides(
        &self,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<TrialFeatureOverride>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trial_feature_overrides WHERE subscription_model_id = $1 ORDER BY feature_key",
            FEATURE_COLS
        ))
        .bind(subscription_model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_feature_override).collect())
    }

    async fn list_entitlement_overrides(
        &self,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<TrialEntitlementOverride>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trial_entitlement_overrides WHERE subscription_model_id = $1 ORDER BY entitlement_key",
            ENTITLEMENT_COLS
        ))
        .bind(subscription_model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_entitlement_override).collect())
    }

    async fn upsert_feature_override(
        &self,
        subscription_model_id: Uuid,
        feature_key: &str,
        enabled: bool,
    ) -> AppResult<TrialFeatureOverride> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO trial_feature_overrides (subscription_model_id, feature_key, enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (subscription_model_id, feature_key)
            DO UPDATE SET enabled = EXCLUDED.enabled
            RETURNING {}
            "#,
            FEATURE_COLS
        ))
        .bind(subscription_model_id)
        .bind(feature_key)
        .bind(enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_feature_override(&row))
    }

    async fn upsert_entitlement_override(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
        value: &serde_json::Value,
    ) -> AppResult<TrialEntitlementOverride> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO trial_entitlement_overrides (subscription_model_id, entitlement_key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (subscription_model_id, entitlement_key)
            DO UPDATE SET value = EXCLUDED.value
            RETURNING {}
            "#,
            ENTITLEMENT_COLS
        ))
        .bind(subscription_model_id)
        .bind(entitlement_key)
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_entitlement_override(&row))
    }

    async fn delete_feature_override(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM trial_feature_overrides WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn delete_entitlement_override(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM trial_entitlement_overrides WHERE id = $1")
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
