use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::audit::NewAuditLog;
use crate::domain::entities::audit::{AuditActionType, AuditEntityType, AuditSource};
use crate::domain::entities::membership::{Membership, OrgRole, TenantAction};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait MembershipRepo: Send + Sync {
    async fn get(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<Option<Membership>>;

    async fn list_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Membership>>;

    /// Delete the membership and write the audit entry in one transaction.
    async fn delete_with_audit(&self, id: Uuid, audit: &NewAuditLog) -> AppResult<()>;

    /// Update the role and write the audit entry in one transaction.
    async fn update_role_with_audit(
        &self,
        id: Uuid,
        role: OrgRole,
        audit: &NewAuditLog,
    ) -> AppResult<Membership>;
}

// ============================================================================
// Policy Table
// ============================================================================

/// Static role policy. Owners and admins hold every tenant action; members
/// and viewers hold none of the administrative ones.
pub fn role_allows(role: OrgRole, action: TenantAction) -> bool {
    match role {
        OrgRole::Owner | OrgRole::Admin => match action {
            TenantAction::InviteUsers
            | TenantAction::RemoveUsers
            | TenantAction::ManageJoinRequests
            | TenantAction::EditOrganization
            | TenantAction::ViewAuditLogs => true,
        },
        OrgRole::Member | OrgRole::Viewer => false,
    }
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct TenantPermissionUseCases {
    memberships: Arc<dyn MembershipRepo>,
}

impl TenantPermissionUseCases {
    pub fn new(memberships: Arc<dyn MembershipRepo>) -> Self {
        Self { memberships }
    }

    /// The caller's role in the organization, if they belong to it.
    #[instrument(skip(self))]
    pub async fn role_of(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<Option<OrgRole>> {
        Ok(self
            .memberships
            .get(user_id, organization_id)
            .await?
            .map(|m| m.role))
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, organization_id: Uuid) -> AppResult<Vec<Membership>> {
        self.memberships.list_by_organization(organization_id).await
    }

    /// Non-members resolve to false for every action.
    #[instrument(skip(self))]
    pub async fn check(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        action: TenantAction,
    ) -> AppResult<bool> {
        Ok(self
            .role_of(user_id, organization_id)
            .await?
            .map(|role| role_allows(role, action))
            .unwrap_or(false))
    }

    /// Whether `actor` may remove `target` from the organization. Removing
    /// yourself is never allowed, whatever your role.
    #[instrument(skip(self))]
    pub async fn can_remove_user(
        &self,
        actor_id: Uuid,
        organization_id: Uuid,
        target_id: Uuid,
    ) -> AppResult<bool> {
        if actor_id == target_id {
            return Ok(false);
        }
        self.check(actor_id, organization_id, TenantAction::RemoveUsers)
            .await
    }

    /// Remove a member, recording who removed whom. The membership delete and
    /// its audit entry commit together.
    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        actor_id: Uuid,
        organization_id: Uuid,
        target_id: Uuid,
        ip_address: Option<String>,
    ) -> AppResult<()> {
        if actor_id == target_id {
            return Err(AppError::SelfRemoval);
        }
        let actor = self
            .memberships
            .get(actor_id, organization_id)
            .await?
            .ok_or(AppError::Forbidden)?;
        if !role_allows(actor.role, TenantAction::RemoveUsers) {
            return Err(AppError::Forbidden);
        }
        let target = self
            .memberships
            .get(target_id, organization_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let audit = NewAuditLog {
            actor_id: Some(actor_id),
            actor_role: Some(actor.role.as_str().to_string()),
            organization_id: Some(organization_id),
            action_type: AuditActionType::UserRemoved,
            entity_type: AuditEntityType::Membership,
            entity_id: Some(target.id.to_string()),
            old_value: serde_json::to_value(&target).ok(),
            new_value: None,
            source: AuditSource::Ui,
            compliance_relevant: true,
            metadata: serde_json::json!({ "removed_user_id": target_id }),
            ip_address,
        };
        self.memberships.delete_with_audit(target.id, &audit).await
    }

    /// Change a member's role, audited as a role change.
    #[instrument(skip(self))]
    pub async fn change_role(
        &self,
        actor_id: Uuid,
        organization_id: Uuid,
        target_id: Uuid,
        new_role: OrgRole,
        ip_address: Option<String>,
    ) -> AppResult<Membership> {
        let actor = self
            .memberships
            .get(actor_id, organization_id)
            .await?
            .ok_or(AppError::Forbidden)?;
        if !role_allows(actor.role, TenantAction::RemoveUsers) {
            return Err(AppError::Forbidden);
        }
        let target = self
            .memberships
            .get(target_id, organization_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let audit = NewAuditLog {
            actor_id: Some(actor_id),
            actor_role: Some(actor.role.as_str().to_string()),
            organization_id: Some(organization_id),
            action_type: AuditActionType::RoleChange,
            entity_type: AuditEntityType::Membership,
            entity_id: Some(target.id.to_string()),
            old_value: Some(serde_json::json!({ "role": target.role.as_str() })),
            new_value: Some(serde_json::json!({ "role": new_role.as_str() })),
            source: AuditSource::Ui,
            compliance_relevant: true,
            metadata: serde_json::Value::Null,
            ip_address,
        };
        self.memberships
            .update_role_with_audit(target.id, new_role, &audit)
            .await
    }
}
