use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_action_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditActionType {
    Create,
    Update,
    Delete,
    Publish,
    Archive,
    Export,
    RoleChange,
    UserAdded,
    UserRemoved,
    PermissionChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_entity_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntityType {
    Organization,
    User,
    Membership,
    Subscription,
    PricingPlan,
    SubscriptionModel,
    Price,
    Entitlement,
    FeatureRegistry,
    TrialFeatureOverride,
    TrialEntitlementOverride,
    SuperAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_source", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSource {
    Ui,
    Api,
    Import,
    Ai,
    System,
}

/// Append-only audit row. Written once; never updated or deleted by
/// application code. Old/new values are structured snapshots, not diffs.
/// The raw IP is always stored; masking happens at read time.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<String>,
    /// Nullable for platform-global actions.
    pub organization_id: Option<Uuid>,
    pub action_type: AuditActionType,
    pub entity_type: AuditEntityType,
    pub entity_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub source: AuditSource,
    pub compliance_relevant: bool,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}
