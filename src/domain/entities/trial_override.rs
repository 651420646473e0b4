use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Replaces a feature's default enablement while the owning organization is
/// in an active trial tied to this subscription model. At most one override
/// per `(subscription_model_id, feature_key)`.
#[derive(Debug, Clone, Serialize)]
pub struct TrialFeatureOverride {
    pub id: Uuid,
    pub subscription_model_id: Uuid,
    pub feature_key: String,
    pub enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Replaces an entitlement's default value during trial. The stored JSON is
/// `null` for unlimited, an integer for limit-kind, a bool for boolean-kind;
/// malformed values are treated as absent at resolution time.
#[derive(Debug, Clone, Serialize)]
pub struct TrialEntitlementOverride {
    pub id: Uuid,
    pub subscription_model_id: Uuid,
    pub entitlement_key: String,
    pub value: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}
