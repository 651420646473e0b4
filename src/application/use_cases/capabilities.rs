use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::clock::Clock;
use crate::application::use_cases::policy_admin::{
    EntitlementCatalogRepo, FeatureRegistryRepo, PricingRepo, TrialOverrideRepo,
};
use crate::application::use_cases::subscription_lifecycle::{OrganizationRepo, SubscriptionRepo};
use crate::domain::entities::entitlement::{EntitlementKind, EntitlementValue, LimitCheck};
use crate::domain::entities::feature_registry::FeatureRegistryEntry;
use crate::domain::entities::pricing::PlanTier;
use crate::domain::entities::subscription::Subscription;

// ============================================================================
// Output Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TrialStatus {
    pub in_trial: bool,
    pub days_remaining: i64,
    pub trial_expires_at: Option<DateTime<Utc>>,
}

/// Everything about one organization's subscription the resolver needs,
/// loaded once per request. Trial state is derived from stored timestamps
/// against the injected clock, never from a stored flag, so an expired trial
/// stops granting access without any write.
#[derive(Debug, Clone)]
struct ResolutionContext {
    subscription: Option<Subscription>,
    now: DateTime<Utc>,
}

impl ResolutionContext {
    fn in_trial(&self) -> bool {
        self.subscription
            .as_ref()
            .map(|s| s.in_trial(self.now))
            .unwrap_or(false)
    }

    fn paid_active(&self) -> bool {
        self.subscription
            .as_ref()
            .map(|s| s.status.is_paid_active())
            .unwrap_or(false)
    }

    fn tier(&self) -> Option<PlanTier> {
        self.subscription.as_ref().and_then(|s| s.plan)
    }

    fn model_id(&self) -> Option<Uuid> {
        self.subscription.as_ref().and_then(|s| s.subscription_model_id)
    }
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct CapabilityUseCases {
    organizations: Arc<dyn OrganizationRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
    features: Arc<dyn FeatureRegistryRepo>,
    entitlements: Arc<dyn EntitlementCatalogRepo>,
    overrides: Arc<dyn TrialOverrideRepo>,
    pricing: Arc<dyn PricingRepo>,
    clock: Arc<dyn Clock>,
}

impl CapabilityUseCases {
    pub fn new(
        organizations: Arc<dyn OrganizationRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        features: Arc<dyn FeatureRegistryRepo>,
        entitlements: Arc<dyn EntitlementCatalogRepo>,
        overrides: Arc<dyn TrialOverrideRepo>,
        pricing: Arc<dyn PricingRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            organizations,
            subscriptions,
            features,
            entitlements,
            overrides,
            pricing,
            clock,
        }
    }

    /// Resolve every registered feature to a boolean for one organization.
    #[instrument(skip(self))]
    pub async fn resolve_capabilities(
        &self,
        organization_id: Uuid,
    ) -> AppResult<BTreeMap<String, bool>> {
        let ctx = self.load_context(organization_id).await?;
        let features = self.features.list().await?;

        let mut map = BTreeMap::new();
        for feature in features {
            let available = self.feature_available(&feature, &ctx).await?;
            map.insert(feature.key, available);
        }
        Ok(map)
    }

    /// Single-feature check. Keys absent from the registry resolve to false.
    #[instrument(skip(self))]
    pub async fn has_feature(&self, organization_id: Uuid, key: &str) -> AppResult<bool> {
        let ctx = self.load_context(organization_id).await?;
        match self.features.get_by_key(key).await? {
            Some(feature) => self.feature_available(&feature, &ctx).await,
            None => Ok(false),
        }
    }

    /// Resolve one entitlement key. Keys absent from the catalog, plans with
    /// no value row, and organizations without a paying subscription all
    /// resolve to `Denied`.
    #[instrument(skip(self))]
    pub async fn resolve_entitlement(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> AppResult<EntitlementValue> {
        let ctx = self.load_context(organization_id).await?;
        let entitlement = match self.entitlements.get_by_key(key).await? {
            Some(e) => e,
            None => return Ok(EntitlementValue::Denied),
        };

        if ctx.in_trial() {
            if let Some(model_id) = ctx.model_id() {
                if let Some(ov) = self
                    .overrides
                    .get_entitlement_override(model_id, key)
                    .await?
                {
                    if let Some(value) = coerce_value(entitlement.kind, &ov.value) {
                        return Ok(value);
                    }
                    warn!(key, model_id = %model_id, "malformed trial entitlement override, ignoring");
                }
            }
            // During a trial, silence means no grant.
            return Ok(EntitlementValue::Denied);
        }

        if !ctx.paid_active() {
            return Ok(EntitlementValue::Denied);
        }

        let plan_id = match self.resolve_plan_id(&ctx).await? {
            Some(id) => id,
            None => return Ok(EntitlementValue::Denied),
        };
        match self.entitlements.get_plan_value(plan_id, key).await? {
            Some(row) => match coerce_value(entitlement.kind, &row.value) {
                Some(value) => Ok(value),
                None => {
                    warn!(key, plan_id = %plan_id, "malformed plan entitlement value, denying");
                    Ok(EntitlementValue::Denied)
                }
            },
            None => Ok(EntitlementValue::Denied),
        }
    }

    /// Limit check against current usage, with `Denied` behaving as a zero
    /// capacity limit.
    #[instrument(skip(self))]
    pub async fn check_entitlement_limit(
        &self,
        organization_id: Uuid,
        key: &str,
        current_usage: i64,
    ) -> AppResult<LimitCheck> {
        let value = self.resolve_entitlement(organization_id, key).await?;
        Ok(LimitCheck::against(value, current_usage))
    }

    #[instrument(skip(self))]
    pub async fn trial_status(&self, organization_id: Uuid) -> AppResult<TrialStatus> {
        let ctx = self.load_context(organization_id).await?;
        let (in_trial, days_remaining, trial_expires_at) = match ctx.subscription.as_ref() {
            Some(sub) => (
                sub.in_trial(ctx.now),
                sub.trial_days_remaining(ctx.now),
                sub.trial_expires_at,
            ),
            None => (false, 0, None),
        };
        Ok(TrialStatus {
            in_trial,
            days_remaining,
            trial_expires_at,
        })
    }

    /// Whether the organization may publish. Requires a paying subscription
    /// outside any trial window, on a plan whose pricing grants publishing.
    #[instrument(skip(self))]
    pub async fn has_publishing_capability(&self, organization_id: Uuid) -> AppResult<bool> {
        let ctx = self.load_context(organization_id).await?;
        self.publishing_capability(&ctx).await
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    async fn load_context(&self, organization_id: Uuid) -> AppResult<ResolutionContext> {
        self.organizations
            .get_by_id(organization_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let subscription = self.subscriptions.get_by_organization(organization_id).await?;
        Ok(ResolutionContext {
            subscription,
            now: self.clock.now(),
        })
    }

    async fn feature_available(
        &self,
        feature: &FeatureRegistryEntry,
        ctx: &ResolutionContext,
    ) -> AppResult<bool> {
        // Kill switch wins over everything else.
        if !feature.enabled {
            return Ok(false);
        }

        let in_trial = ctx.in_trial();

        if feature.requires_active_subscription
            && !ctx.paid_active()
            && !(in_trial && feature.visible_in_trial)
        {
            return Ok(false);
        }

        if in_trial {
            if let Some(model_id) = ctx.model_id() {
                if let Some(ov) = self
                    .overrides
                    .get_feature_override(model_id, &feature.key)
                    .await?
                {
                    return Ok(ov.enabled);
                }
            }
            return Ok(feature.usable_in_trial);
        }

        if !ctx.paid_active() {
            return Ok(false);
        }
        let tier = match ctx.tier() {
            Some(t) => t,
            None => return Ok(false),
        };
        if !tier.satisfies(feature.minimum_plan) {
            return Ok(false);
        }
        if feature.requires_publishing_capability && !self.publishing_capability(ctx).await? {
            return Ok(false);
        }
        Ok(true)
    }

    async fn publishing_capability(&self, ctx: &ResolutionContext) -> AppResult<bool> {
        if !ctx.paid_active() || ctx.in_trial() {
            return Ok(false);
        }
        match ctx.model_id() {
            Some(model_id) => {
                let model = match self.pricing.get_model(model_id).await? {
                    Some(m) => m,
                    None => return Ok(false),
                };
                Ok(self
                    .pricing
                    .get_plan(model.pricing_plan_id)
                    .await?
                    .map(|p| p.grants_publishing)
                    // Rows predating the pricing catalog keep their
                    // status-derived grant.
                    .unwrap_or(true))
            }
            None => Ok(true),
        }
    }

    async fn resolve_plan_id(&self, ctx: &ResolutionContext) -> AppResult<Option<Uuid>> {
        if let Some(model_id) = ctx.model_id() {
            if let Some(model) = self.pricing.get_model(model_id).await? {
                return Ok(Some(model.pricing_plan_id));
            }
        }
        match ctx.tier() {
            Some(tier) => Ok(self.pricing.get_plan_by_tier(tier).await?.map(|p| p.id)),
            None => Ok(None),
        }
    }
}

/// Interpret a stored JSON value against the entitlement's declared kind.
/// Returns `None` when the JSON does not fit the kind.
fn coerce_value(kind: EntitlementKind, raw: &serde_json::Value) -> Option<EntitlementValue> {
    match kind {
        EntitlementKind::Limit => match raw {
            serde_json::Value::Null => Some(EntitlementValue::Unlimited),
            serde_json::Value::Number(n) => n
                .as_i64()
                .filter(|v| *v >= 0)
                .map(EntitlementValue::Limit),
            _ => None,
        },
        EntitlementKind::Boolean => match raw {
            serde_json::Value::Bool(true) => Some(EntitlementValue::Granted),
            serde_json::Value::Bool(false) => Some(EntitlementValue::Denied),
            _ => None,
        },
    }
}
