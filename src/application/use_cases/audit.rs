use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::application::use_cases::platform_permissions::{
    can_see_ip_addresses, require_permission,
};
use crate::domain::entities::audit::{AuditActionType, AuditEntityType, AuditLog, AuditSource};
use crate::domain::entities::super_admin::{AdminAction, AdminResource, SuperAdminRole};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    /// Single insert, write-once. Rows are never updated or deleted.
    async fn insert(&self, entry: &NewAuditLog) -> AppResult<Uuid>;

    async fn query(&self, filter: &AuditLogFilter) -> AppResult<AuditLogPage>;
}

// ============================================================================
// Input / Query Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<String>,
    pub organization_id: Option<Uuid>,
    pub action_type: AuditActionType,
    pub entity_type: AuditEntityType,
    pub entity_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub source: AuditSource,
    pub compliance_relevant: bool,
    pub metadata: serde_json::Value,
    /// Raw IP. Always stored as-is; masking is a read-time concern.
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilter {
    pub organization_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub entity_type: Option<AuditEntityType>,
    pub entity_id: Option<String>,
    pub action_type: Option<AuditActionType>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl AuditLogFilter {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(50).clamp(1, 200)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub entries: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct AuditUseCases {
    repo: Arc<dyn AuditLogRepo>,
}

impl AuditUseCases {
    pub fn new(repo: Arc<dyn AuditLogRepo>) -> Self {
        Self { repo }
    }

    /// Append one audit row. Failures surface synchronously to the caller.
    #[instrument(skip(self, entry), fields(action = ?entry.action_type, entity = ?entry.entity_type))]
    pub async fn record(&self, entry: &NewAuditLog) -> AppResult<Uuid> {
        self.repo.insert(entry).await
    }

    /// Append one audit row for a mutation that already happened. A failed
    /// audit write is logged and swallowed; it does not roll back the
    /// business transaction it describes.
    pub async fn record_best_effort(&self, entry: &NewAuditLog) -> Option<Uuid> {
        match self.repo.insert(entry).await {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    action = ?entry.action_type,
                    entity = ?entry.entity_type,
                    entity_id = ?entry.entity_id,
                    "Audit write failed; business mutation was not rolled back"
                );
                None
            }
        }
    }

    /// Filtered, paginated projection. IP addresses are masked at read time
    /// unless the viewer's platform role may see them; stored rows keep the
    /// raw value either way.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        viewer: SuperAdminRole,
        filter: &AuditLogFilter,
    ) -> AppResult<AuditLogPage> {
        require_permission(viewer, AdminResource::Audit, AdminAction::Read)?;

        let mut page = self.repo.query(filter).await?;
        if !can_see_ip_addresses(viewer) {
            for entry in &mut page.entries {
                entry.ip_address = entry.ip_address.as_deref().map(mask_ip_address);
            }
        }
        Ok(page)
    }
}

/// Keep the first octet, mask the rest: `203.0.113.7` -> `203.xxx.xxx.xxx`.
/// Non-IPv4 shapes collapse entirely.
pub fn mask_ip_address(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() == 4 {
        format!("{}.xxx.xxx.xxx", parts[0])
    } else {
        "xxx.xxx.xxx.xxx".to_string()
    }
}
