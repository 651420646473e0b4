use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::policy_admin::{
        CreateModelInput, CreatePlanInput, NewPriceInput, PricingRepo,
    },
    domain::entities::pricing::{PlanTier, Price, PricingPlan, SubscriptionModel},
};

fn row_to_plan(row: &PgRow) -> PricingPlan {
    PricingPlan {
        id: row.get("id"),
        name: row.get("name"),
        tier: row.get("tier"),
        grants_publishing: row.get("grants_publishing"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_model(row: &PgRow) -> SubscriptionModel {
    SubscriptionModel {
        id: row.get("id"),
        pricing_plan_id: row.get("pricing_plan_id"),
        interval: row.get("interval"),
        trial_days: row.get("trial_days"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_price(row: &PgRow) -> Price {
    Price {
        id: row.get("id"),
        subscription_model_id: row.get("subscription_model_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        is_active: row.get("is_active"),
        valid_from: row.get("valid_from"),
        valid_to: row.get("valid_to"),
        created_at: row.get("created_at"),
    }
}

const PLAN_COLS: &str = "id, name, tier, grants_publishing, created_at, updated_at";
const MODEL_COLS: &str = "id, pricing_plan_id, interval, trial_days, is_active, created_at, updated_at";
const PRICE_COLS: &str =
    "id, subscription_model_id, amount_cents, currency, is_active, valid_from, valid_to, created_at";

#[async_trait]
impl PricingRepo for PostgresPersistence {
    async fn get_plan(&self, id: Uuid) -> AppResult<Option<PricingPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pricing_plans WHERE id = $1",
            PLAN_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan))
    }

    async fn get_plan_by_tier(&self, tier: PlanTier) -> AppResult<Option<PricingPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pricing_plans WHERE tier = $1 ORDER BY created_at ASC LIMIT 1",
            PLAN_COLS
        ))
        .bind(tier)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan))
    }

    async fn list_plans(&self) -> AppResult<Vec<PricingPlan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pricing_plans ORDER BY tier, name",
            PLAN_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_plan).collect())
    }

    async fn create_plan(&self, input: &CreatePlanInput) -> AppResult<PricingPlan> {
        let row = sqlx::query(&format!(
            "INSERT INTO pricing_plans (name, tier, grants_publishing) VALUES ($1, $2, $3) RETURNING {}",
            PLAN_COLS
        ))
        .bind(&input.name)
        .bind(input.tier)
        .bind(input.grants_publishing)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_plan(&row))
    }

    async fn get_model(&self, id: Uuid) -> AppResult<Option<SubscriptionModel>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_models WHERE id = $1",
            MODEL_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_model))
    }

    async fn list_models(&self, pricing_plan_id: Uuid) -> AppResult<Vec<SubscriptionModel>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_models WHERE pricing_plan_id = $1 ORDER BY interval",
            MODEL_COLS
        ))
        .bind(pricing_plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_model).collect())
    }

    async fn create_model(&self, input: &CreateModelInput) -> AppResult<SubscriptionModel> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscription_models (pricing_plan_id, interval, trial_days, is_active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING {}
            "#,
            MODEL_COLS
        ))
        .bind(input.pricing_plan_id)
        .bind(input.interval)
        .bind(input.trial_days)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_model(&row))
    }

    async fn current_price(
        &self,
        subscription_model_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Price>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM prices
            WHERE subscription_model_id = $1
              AND is_active = TRUE
              AND valid_from <= $2
              AND (valid_to IS NULL OR valid_to > $2)
            ORDER BY valid_from DESC
            LIMIT 1
            "#,
            PRICE_COLS
        ))
        .bind(subscription_model_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_price))
    }

    async fn list_prices(&self, subscription_model_id: Uuid) -> AppResult<Vec<Price>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM prices WHERE subscription_model_id = $1 ORDER BY valid_from DESC",
            PRICE_COLS
        ))
        .bind(subscription_model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_price).collect())
    }

    async fn supersede_price(&self, input: &NewPriceInput) -> AppResult<Price> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        // Close any open window before inserting the successor. History rows
        // keep their original values.
        sqlx::query(
            r#"
            UPDATE prices
            SET valid_to = $2
            WHERE subscription_model_id = $1
              AND is_active = TRUE
              AND valid_to IS NULL
            "#,
        )
        .bind(input.subscription_model_id)
        .bind(input.valid_from)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO prices (subscription_model_id, amount_cents, currency, is_active, valid_from, valid_to)
            VALUES ($1, $2, $3, TRUE, $4, $5)
            RETURNING {}
            "#,
            PRICE_COLS
        ))
        .bind(input.subscription_model_id)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_price(&row))
    }
}
