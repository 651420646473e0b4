use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::clock::Clock;
use crate::application::use_cases::audit::NewAuditLog;
use crate::application::use_cases::platform_permissions::require_permission;
use crate::application::use_cases::policy_admin::{AdminActor, PricingRepo};
use crate::domain::entities::audit::{AuditActionType, AuditEntityType, AuditSource};
use crate::domain::entities::organization::Organization;
use crate::domain::entities::pricing::PlanTier;
use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};
use crate::domain::entities::super_admin::{AdminAction, AdminResource};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait OrganizationRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Organization>>;
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_organization(&self, organization_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Insert honoring the unique `organization_id` constraint; a concurrent
    /// duplicate surfaces as `Conflict`, never as a second row. The audit
    /// entry is written in the same transaction.
    async fn create(&self, input: &NewSubscription, audit: &NewAuditLog) -> AppResult<Subscription>;

    /// Apply a state transition and its audit entry in one transaction, so a
    /// crash never leaves a transition unrecorded.
    async fn apply(
        &self,
        id: Uuid,
        patch: &SubscriptionPatch,
        audit: &NewAuditLog,
    ) -> AppResult<Subscription>;

    /// Rows flagged `trial_active` whose shape is invalid: missing model,
    /// missing expiry, or expiry in the past.
    async fn list_trial_invalid(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;
}

// ============================================================================
// Input / Output Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub organization_id: Uuid,
    pub plan: Option<PlanTier>,
    pub status: SubscriptionStatus,
    pub subscription_model_id: Option<Uuid>,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Full target field set for one transition. Absent-as-`None` clears.
#[derive(Debug, Clone)]
pub struct SubscriptionPatch {
    pub status: SubscriptionStatus,
    pub plan: Option<PlanTier>,
    pub subscription_model_id: Option<Uuid>,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl SubscriptionPatch {
    fn from_current(sub: &Subscription) -> Self {
        SubscriptionPatch {
            status: sub.status,
            plan: sub.plan,
            subscription_model_id: sub.subscription_model_id,
            trial_started_at: sub.trial_started_at,
            trial_expires_at: sub.trial_expires_at,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            canceled_at: sub.canceled_at,
        }
    }
}

/// Who performed a subscription mutation, for the audit trail.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<String>,
    pub source: AuditSource,
    pub ip_address: Option<String>,
}

impl ActorContext {
    pub fn system() -> Self {
        ActorContext {
            actor_id: None,
            actor_role: None,
            source: AuditSource::System,
            ip_address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidSubscriptionState {
    pub organization_id: Uuid,
    pub subscription_id: Uuid,
    pub status: SubscriptionStatus,
    pub issue: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub cleaned: usize,
    pub errors: Vec<String>,
}

// ============================================================================
// Transition Rules
// ============================================================================

/// Legal status transitions. Expired and canceled are terminal for the
/// current commitment but re-enter `active` via a new upgrade.
pub fn can_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> bool {
    use SubscriptionStatus::*;
    match (from, to) {
        (NoSubscription, TrialActive | Active) => true,
        (TrialActive, Active | Expired) => true,
        // Active -> Active covers renewal and plan changes.
        (Active, Active | Canceled | PastDue) => true,
        (PastDue, Active | Canceled | Expired) => true,
        (Expired | Canceled, Active) => true,
        _ => false,
    }
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    organizations: Arc<dyn OrganizationRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
    pricing: Arc<dyn PricingRepo>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionUseCases {
    pub fn new(
        organizations: Arc<dyn OrganizationRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        pricing: Arc<dyn PricingRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            organizations,
            subscriptions,
            pricing,
            clock,
        }
    }

    /// Current subscription record, if the organization has one.
    #[instrument(skip(self))]
    pub async fn current(&self, organization_id: Uuid) -> AppResult<Option<Subscription>> {
        self.require_organization(organization_id).await?;
        self.subscriptions.get_by_organization(organization_id).await
    }

    /// Signup without a selected paid plan: an explicit `no_subscription`
    /// record, never an implicit trial. Idempotent against concurrent signups.
    #[instrument(skip(self))]
    pub async fn signup(&self, organization_id: Uuid, actor: &ActorContext) -> AppResult<Subscription> {
        self.require_organization(organization_id).await?;

        if let Some(existing) = self.subscriptions.get_by_organization(organization_id).await? {
            return Ok(existing);
        }

        let input = NewSubscription {
            organization_id,
            plan: None,
            status: SubscriptionStatus::NoSubscription,
            subscription_model_id: None,
            trial_started_at: None,
            trial_expires_at: None,
            current_period_start: None,
            current_period_end: None,
        };
        let audit = self.entry(
            actor,
            organization_id,
            AuditActionType::Create,
            None,
            serde_json::json!({ "status": "no_subscription" }),
            serde_json::Value::Null,
        );

        match self.subscriptions.create(&input, &audit).await {
            Ok(sub) => Ok(sub),
            // Lost the race: the row now exists, reuse it.
            Err(AppError::Conflict(_)) => self
                .subscriptions
                .get_by_organization(organization_id)
                .await?
                .ok_or(AppError::NotFound),
            Err(err) => Err(err),
        }
    }

    /// Enter `trial_active` through an explicit subscription model with
    /// `trial_days > 0`. Only valid from `no_subscription`.
    #[instrument(skip(self))]
    pub async fn start_trial(
        &self,
        organization_id: Uuid,
        subscription_model_id: Uuid,
        actor: &ActorContext,
    ) -> AppResult<Subscription> {
        self.require_organization(organization_id).await?;

        let model = self
            .pricing
            .get_model(subscription_model_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !model.is_active {
            return Err(AppError::InvalidInput(
                "Subscription model is not active".into(),
            ));
        }
        if model.trial_days <= 0 {
            return Err(AppError::InvalidInput(
                "Subscription model does not offer a trial".into(),
            ));
        }
        let plan = self
            .pricing
            .get_plan(model.pricing_plan_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = self.clock.now();
        let expires = now + Duration::days(model.trial_days as i64);

        let existing = self.subscriptions.get_by_organization(organization_id).await?;
        match existing {
            None => {
                let input = NewSubscription {
                    organization_id,
                    plan: Some(plan.tier),
                    status: SubscriptionStatus::TrialActive,
                    subscription_model_id: Some(model.id),
                    trial_started_at: Some(now),
                    trial_expires_at: Some(expires),
                    current_period_start: None,
                    current_period_end: None,
                };
                let audit = self.entry(
                    actor,
                    organization_id,
                    AuditActionType::Create,
                    None,
                    serde_json::json!({
                        "status": "trial_active",
                        "subscription_model_id": model.id,
                        "trial_expires_at": expires,
                    }),
                    serde_json::Value::Null,
                );
                self.subscriptions.create(&input, &audit).await
            }
            Some(sub) => {
                if !can_transition(sub.status, SubscriptionStatus::TrialActive) {
                    return Err(AppError::Conflict(format!(
                        "Cannot start a trial from status '{}'",
                        sub.status.as_str()
                    )));
                }
                let patch = SubscriptionPatch {
                    status: SubscriptionStatus::TrialActive,
                    plan: Some(plan.tier),
                    subscription_model_id: Some(model.id),
                    trial_started_at: Some(now),
                    trial_expires_at: Some(expires),
                    current_period_start: None,
                    current_period_end: None,
                    cancel_at_period_end: false,
                    canceled_at: None,
                };
                self.transition(&sub, patch, actor, serde_json::Value::Null)
                    .await
            }
        }
    }

    /// Upgrade to a paid subscription: clears the trial window and opens a
    /// billing period defined by the model's interval. Concurrent upgrades
    /// resolve against the unique organization constraint: the loser retries
    /// against the now-existing row, last writer wins.
    #[instrument(skip(self))]
    pub async fn upgrade(
        &self,
        organization_id: Uuid,
        subscription_model_id: Uuid,
        actor: &ActorContext,
    ) -> AppResult<Subscription> {
        self.require_organization(organization_id).await?;

        let model = self
            .pricing
            .get_model(subscription_model_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let plan = self
            .pricing
            .get_plan(model.pricing_plan_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = self.clock.now();
        let period_end = now + Duration::days(model.interval.period_days());
        let patch = SubscriptionPatch {
            status: SubscriptionStatus::Active,
            plan: Some(plan.tier),
            subscription_model_id: Some(model.id),
            trial_started_at: None,
            trial_expires_at: None,
            current_period_start: Some(now),
            current_period_end: Some(period_end),
            cancel_at_period_end: false,
            canceled_at: None,
        };

        match self.subscriptions.get_by_organization(organization_id).await? {
            Some(sub) => {
                self.transition(&sub, patch, actor, serde_json::Value::Null)
                    .await
            }
            None => {
                let input = NewSubscription {
                    organization_id,
                    plan: patch.plan,
                    status: patch.status,
                    subscription_model_id: patch.subscription_model_id,
                    trial_started_at: None,
                    trial_expires_at: None,
                    current_period_start: patch.current_period_start,
                    current_period_end: patch.current_period_end,
                };
                let audit = self.entry(
                    actor,
                    organization_id,
                    AuditActionType::Create,
                    None,
                    serde_json::json!({
                        "status": "active",
                        "subscription_model_id": model.id,
                    }),
                    serde_json::Value::Null,
                );
                match self.subscriptions.create(&input, &audit).await {
                    Ok(sub) => Ok(sub),
                    Err(AppError::Conflict(_)) => {
                        let sub = self
                            .subscriptions
                            .get_by_organization(organization_id)
                            .await?
                            .ok_or(AppError::NotFound)?;
                        self.transition(&sub, patch, actor, serde_json::Value::Null)
                            .await
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Cancel an active subscription, either immediately or at period end.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        organization_id: Uuid,
        at_period_end: bool,
        actor: &ActorContext,
    ) -> AppResult<Subscription> {
        self.require_organization(organization_id).await?;
        let sub = self
            .subscriptions
            .get_by_organization(organization_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if sub.status != SubscriptionStatus::Active {
            return Err(AppError::Conflict(format!(
                "Cannot cancel a subscription in status '{}'",
                sub.status.as_str()
            )));
        }

        let now = self.clock.now();
        let mut patch = SubscriptionPatch::from_current(&sub);
        if at_period_end {
            patch.cancel_at_period_end = true;
        } else {
            patch.status = SubscriptionStatus::Canceled;
            patch.canceled_at = Some(now);
            patch.cancel_at_period_end = false;
        }
        self.transition(&sub, patch, actor, serde_json::Value::Null)
            .await
    }

    /// Renewal: same plan, fresh billing period.
    #[instrument(skip(self))]
    pub async fn renew(&self, organization_id: Uuid, actor: &ActorContext) -> AppResult<Subscription> {
        self.require_organization(organization_id).await?;
        let sub = self
            .subscriptions
            .get_by_organization(organization_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if sub.status != SubscriptionStatus::Active {
            return Err(AppError::Conflict(format!(
                "Cannot renew a subscription in status '{}'",
                sub.status.as_str()
            )));
        }

        let period_days = match sub.subscription_model_id {
            Some(model_id) => self
                .pricing
                .get_model(model_id)
                .await?
                .map(|m| m.interval.period_days())
                .unwrap_or(30),
            None => 30,
        };
        let now = self.clock.now();
        let mut patch = SubscriptionPatch::from_current(&sub);
        patch.current_period_start = Some(now);
        patch.current_period_end = Some(now + Duration::days(period_days));
        self.transition(&sub, patch, actor, serde_json::Value::Null)
            .await
    }

    #[instrument(skip(self))]
    pub async fn mark_past_due(
        &self,
        organization_id: Uuid,
        actor: &ActorContext,
    ) -> AppResult<Subscription> {
        self.require_organization(organization_id).await?;
        let sub = self
            .subscriptions
            .get_by_organization(organization_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let mut patch = SubscriptionPatch::from_current(&sub);
        patch.status = SubscriptionStatus::PastDue;
        self.transition(&sub, patch, actor, serde_json::Value::Null)
            .await
    }

    // ========================================================================
    // Cleanup (operator-invoked repair)
    // ========================================================================

    /// Detect invalid trial shapes without touching anything.
    #[instrument(skip(self))]
    pub async fn detect_invalid_states(
        &self,
        viewer: &AdminActor,
    ) -> AppResult<Vec<InvalidSubscriptionState>> {
        require_permission(viewer.role, AdminResource::Organization, AdminAction::Read)?;
        let now = self.clock.now();
        let rows = self.subscriptions.list_trial_invalid(now).await?;
        Ok(rows
            .iter()
            .map(|sub| InvalidSubscriptionState {
                organization_id: sub.organization_id,
                subscription_id: sub.id,
                status: sub.status,
                issue: classify_invalid(sub, now),
            })
            .collect())
    }

    /// Repair invalid states by reclassifying them to `expired`, recording
    /// reason and actor. Requires explicit confirmation. Idempotent: repaired
    /// rows no longer match detection, so a second run reports zero
    /// corrections and writes no further audit entries.
    #[instrument(skip(self))]
    pub async fn cleanup_invalid_states(
        &self,
        actor: &AdminActor,
        reason: &str,
        confirm: bool,
    ) -> AppResult<CleanupReport> {
        require_permission(actor.role, AdminResource::Organization, AdminAction::Update)?;
        if !confirm {
            return Err(AppError::ConfirmationRequired);
        }

        let now = self.clock.now();
        let rows = self.subscriptions.list_trial_invalid(now).await?;
        let mut cleaned = 0usize;
        let mut errors = Vec::new();

        for sub in rows {
            // Repair target: expired, trial window cleared.
            let mut patch = SubscriptionPatch::from_current(&sub);
            patch.status = SubscriptionStatus::Expired;
            patch.trial_started_at = None;
            patch.trial_expires_at = None;

            let issue = classify_invalid(&sub, now);
            let audit = NewAuditLog {
                actor_id: Some(actor.id),
                actor_role: Some(actor.role.as_str().to_string()),
                organization_id: Some(sub.organization_id),
                action_type: AuditActionType::Update,
                entity_type: AuditEntityType::Subscription,
                entity_id: Some(sub.id.to_string()),
                old_value: serde_json::to_value(&sub).ok(),
                new_value: Some(serde_json::json!({ "status": "expired" })),
                source: AuditSource::Api,
                compliance_relevant: true,
                metadata: serde_json::json!({ "reason": reason, "issue": issue }),
                ip_address: actor.ip_address.clone(),
            };

            match self.subscriptions.apply(sub.id, &patch, &audit).await {
                Ok(_) => cleaned += 1,
                Err(err) => errors.push(format!("subscription {}: {}", sub.id, err)),
            }
        }

        Ok(CleanupReport { cleaned, errors })
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    async fn require_organization(&self, organization_id: Uuid) -> AppResult<Organization> {
        self.organizations
            .get_by_id(organization_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn transition(
        &self,
        current: &Subscription,
        patch: SubscriptionPatch,
        actor: &ActorContext,
        metadata: serde_json::Value,
    ) -> AppResult<Subscription> {
        if patch.status != current.status && !can_transition(current.status, patch.status) {
            return Err(AppError::Conflict(format!(
                "Illegal subscription transition {} -> {}",
                current.status.as_str(),
                patch.status.as_str()
            )));
        }

        let audit = self.entry(
            actor,
            current.organization_id,
            AuditActionType::Update,
            serde_json::to_value(current).ok(),
            serde_json::json!({ "status": patch.status.as_str() }),
            metadata,
        );
        self.subscriptions.apply(current.id, &patch, &audit).await
    }

    fn entry(
        &self,
        actor: &ActorContext,
        organization_id: Uuid,
        action_type: AuditActionType,
        old_value: Option<serde_json::Value>,
        new_value: serde_json::Value,
        metadata: serde_json::Value,
    ) -> NewAuditLog {
        NewAuditLog {
            actor_id: actor.actor_id,
            actor_role: actor.actor_role.clone(),
            organization_id: Some(organization_id),
            action_type,
            entity_type: AuditEntityType::Subscription,
            entity_id: None,
            old_value,
            new_value: Some(new_value),
            source: actor.source,
            compliance_relevant: true,
            metadata,
            ip_address: actor.ip_address.clone(),
        }
    }
}

fn classify_invalid(sub: &Subscription, now: DateTime<Utc>) -> String {
    if sub.subscription_model_id.is_none() {
        "trial_without_model".to_string()
    } else if sub.trial_expires_at.is_none() {
        "trial_without_expiry".to_string()
    } else if sub.trial_expires_at.map(|t| t <= now).unwrap_or(false) {
        "trial_expired".to_string()
    } else {
        "unknown".to_string()
    }
}
