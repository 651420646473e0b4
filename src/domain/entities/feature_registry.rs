use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::pricing::PlanTier;

/// Static policy metadata for one feature flag. The `key` is globally unique;
/// `enabled = false` is a kill switch that wins over every other rule.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRegistryEntry {
    pub id: Uuid,
    pub key: String,
    pub category: String,
    pub minimum_plan: PlanTier,
    pub requires_active_subscription: bool,
    pub requires_publishing_capability: bool,
    pub visible_in_trial: bool,
    pub usable_in_trial: bool,
    pub enabled: bool,
    pub default_for_new_dpps: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
