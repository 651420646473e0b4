use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Plan tier ordering used for minimum-plan checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Basic,
    Pro,
    Premium,
}

impl PlanTier {
    /// Numeric rank for plan comparisons (basic < pro < premium).
    pub fn rank(&self) -> u8 {
        match self {
            PlanTier::Basic => 1,
            PlanTier::Pro => 2,
            PlanTier::Premium => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Premium => "premium",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Some(PlanTier::Basic),
            "pro" => Some(PlanTier::Pro),
            "premium" => Some(PlanTier::Premium),
            _ => None,
        }
    }

    /// True when this plan satisfies `minimum` for a minimum-plan gate.
    pub fn satisfies(&self, minimum: PlanTier) -> bool {
        self.rank() >= minimum.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_interval", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    /// Billing period length in days, used when a model defines the period.
    pub fn period_days(&self) -> i64 {
        match self {
            BillingInterval::Monthly => 30,
            BillingInterval::Yearly => 365,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingPlan {
    pub id: Uuid,
    pub name: String,
    pub tier: PlanTier,
    /// Whether the plan grants the publishing capability at all.
    pub grants_publishing: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Billing-interval variant of a pricing plan. Trials are only ever entered
/// through a model with `trial_days > 0`.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionModel {
    pub id: Uuid,
    pub pricing_plan_id: Uuid,
    pub interval: BillingInterval,
    pub trial_days: i32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Time-ranged price row. History is superseded with new validity windows,
/// never edited in place.
#[derive(Debug, Clone, Serialize)]
pub struct Price {
    pub id: Uuid,
    pub subscription_model_id: Uuid,
    pub amount_cents: i32,
    pub currency: String,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Price {
    /// The "current" row: active and not yet superseded.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.valid_to.map(|t| t > now).unwrap_or(true)
    }
}
