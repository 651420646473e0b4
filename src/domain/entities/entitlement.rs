use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entitlement_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntitlementKind {
    Limit,
    Boolean,
}

/// Catalog row for a named numeric or boolean limit
/// (`max_published_dpp`, `max_storage_gb`, `max_users`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct Entitlement {
    pub id: Uuid,
    pub key: String,
    pub kind: EntitlementKind,
    pub unit: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-plan value for an entitlement. The stored JSON is `null` for
/// unlimited, an integer for limit-kind, a bool for boolean-kind.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntitlement {
    pub id: Uuid,
    pub pricing_plan_id: Uuid,
    pub entitlement_key: String,
    pub value: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

/// Resolved entitlement value. Absence of any applicable row resolves to
/// `Denied`, never to an implicit "unlimited".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntitlementValue {
    Unlimited,
    Limit(i64),
    Granted,
    Denied,
}

impl EntitlementValue {
    pub fn is_denied(&self) -> bool {
        matches!(self, EntitlementValue::Denied)
    }

    /// Limit for capacity math: `None` means unlimited. Boolean grants have
    /// no capacity and map to unlimited/zero.
    pub fn limit(&self) -> Option<i64> {
        match self {
            EntitlementValue::Unlimited | EntitlementValue::Granted => None,
            EntitlementValue::Limit(n) => Some(*n),
            EntitlementValue::Denied => Some(0),
        }
    }
}

/// Result of comparing current usage against a resolved limit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    /// `None` = unlimited.
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
}

impl LimitCheck {
    pub fn against(value: EntitlementValue, current_usage: i64) -> Self {
        match value.limit() {
            None => LimitCheck {
                allowed: true,
                limit: None,
                remaining: None,
            },
            Some(limit) => LimitCheck {
                allowed: current_usage < limit,
                limit: Some(limit),
                remaining: Some((limit - current_usage).max(0)),
            },
        }
    }
}
