use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform-plane role. Shares nothing with tenant memberships; a tenant
/// role bug can never grant one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "super_admin_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuperAdminRole {
    SuperAdmin,
    SupportAdmin,
    ReadOnlyAdmin,
}

impl SuperAdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuperAdminRole::SuperAdmin => "super_admin",
            SuperAdminRole::SupportAdmin => "support_admin",
            SuperAdminRole::ReadOnlyAdmin => "read_only_admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "super_admin" => Some(SuperAdminRole::SuperAdmin),
            "support_admin" => Some(SuperAdminRole::SupportAdmin),
            "read_only_admin" => Some(SuperAdminRole::ReadOnlyAdmin),
            _ => None,
        }
    }
}

/// Resource axis of the platform permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminResource {
    Organization,
    User,
    Template,
    Pricing,
    Audit,
    System,
}

/// Action axis of the platform permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct SuperAdmin {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_salt: String,
    pub password_hash: String,
    pub role: SuperAdminRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Server-side session row. The client holds a JWT carrying the session id;
/// each request re-verifies both the signature and this row.
#[derive(Debug, Clone)]
pub struct SuperAdminSession {
    pub id: Uuid,
    pub super_admin_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
