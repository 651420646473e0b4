use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::audit_log::insert_audit_log,
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::audit::NewAuditLog,
    application::use_cases::subscription_lifecycle::{
        NewSubscription, SubscriptionPatch, SubscriptionRepo,
    },
    domain::entities::subscription::Subscription,
};

fn row_to_subscription(row: &PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        plan: row.get("plan"),
        status: row.get("status"),
        subscription_model_id: row.get("subscription_model_id"),
        trial_started_at: row.get("trial_started_at"),
        trial_expires_at: row.get("trial_expires_at"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        canceled_at: row.get("canceled_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, organization_id, plan, status, subscription_model_id,
    trial_started_at, trial_expires_at, current_period_start,
    current_period_end, cancel_at_period_end, canceled_at,
    created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_organization(&self, organization_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE organization_id = $1",
            SELECT_COLS
        ))
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn create(&self, input: &NewSubscription, audit: &NewAuditLog) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        // The unique organization_id index turns a concurrent duplicate into
        // a Conflict via the sqlx error mapping.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                organization_id, plan, status, subscription_model_id,
                trial_started_at, trial_expires_at, current_period_start,
                current_period_end
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(input.organization_id)
        .bind(input.plan)
        .bind(input.status)
        .bind(input.subscription_model_id)
        .bind(input.trial_started_at)
        .bind(input.trial_expires_at)
        .bind(input.current_period_start)
        .bind(input.current_period_end)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let subscription = row_to_subscription(&row);
        let mut entry = audit.clone();
        entry.entity_id = Some(subscription.id.to_string());
        insert_audit_log(&mut *tx, &entry)
            .await
            .map_err(AppError::from)?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(subscription)
    }

    async fn apply(
        &self,
        id: Uuid,
        patch: &SubscriptionPatch,
        audit: &NewAuditLog,
    ) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET plan = $2,
                status = $3,
                subscription_model_id = $4,
                trial_started_at = $5,
                trial_expires_at = $6,
                current_period_start = $7,
                current_period_end = $8,
                cancel_at_period_end = $9,
                canceled_at = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(patch.plan)
        .bind(patch.status)
        .bind(patch.subscription_model_id)
        .bind(patch.trial_started_at)
        .bind(patch.trial_expires_at)
        .bind(patch.current_period_start)
        .bind(patch.current_period_end)
        .bind(patch.cancel_at_period_end)
        .bind(patch.canceled_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;

        let subscription = row_to_subscription(&row);
        let mut entry = audit.clone();
        if entry.entity_id.is_none() {
            entry.entity_id = Some(subscription.id.to_string());
        }
        insert_audit_log(&mut *tx, &entry)
            .await
            .map_err(AppError::from)?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(subscription)
    }

    async fn list_trial_invalid(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE status = 'trial_active'
              AND (
                    subscription_model_id IS NULL
                 OR trial_expires_at IS NULL
                 OR trial_expires_at <= $1
              )
            ORDER BY created_at ASC
            "#,
            SELECT_COLS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }
}
