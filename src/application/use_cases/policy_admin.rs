use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::audit::{AuditUseCases, NewAuditLog};
use crate::application::use_cases::platform_permissions::require_permission;
use crate::domain::entities::audit::{AuditActionType, AuditEntityType, AuditSource};
use crate::domain::entities::entitlement::{Entitlement, EntitlementKind, PlanEntitlement};
use crate::domain::entities::feature_registry::FeatureRegistryEntry;
use crate::domain::entities::pricing::{BillingInterval, PlanTier, Price, PricingPlan, SubscriptionModel};
use crate::domain::entities::super_admin::{AdminAction, AdminResource, SuperAdminRole};
use crate::domain::entities::trial_override::{TrialEntitlementOverride, TrialFeatureOverride};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait FeatureRegistryRepo: Send + Sync {
    async fn list(&self) -> AppResult<Vec<FeatureRegistryEntry>>;

    /// Entries with the global kill switch on. Disabled entries never reach
    /// the resolver through this path.
    async fn list_enabled(&self) -> AppResult<Vec<FeatureRegistryEntry>>;

    async fn get_by_key(&self, key: &str) -> AppResult<Option<FeatureRegistryEntry>>;

    async fn create(&self, input: &CreateFeatureInput) -> AppResult<FeatureRegistryEntry>;

    async fn update(&self, id: Uuid, input: &UpdateFeatureInput) -> AppResult<FeatureRegistryEntry>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait EntitlementCatalogRepo: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Entitlement>>;

    async fn get_by_key(&self, key: &str) -> AppResult<Option<Entitlement>>;

    async fn create(&self, key: &str, kind: EntitlementKind, unit: Option<&str>)
        -> AppResult<Entitlement>;

    /// Plan-level value row; `value` JSON follows the catalog kind.
    async fn upsert_plan_value(
        &self,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
        value: &serde_json::Value,
    ) -> AppResult<PlanEntitlement>;

    async fn get_plan_value(
        &self,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
    ) -> AppResult<Option<PlanEntitlement>>;

    async fn list_plan_values(&self, pricing_plan_id: Uuid) -> AppResult<Vec<PlanEntitlement>>;
}

#[async_trait]
pub trait TrialOverrideRepo: Send + Sync {
    async fn get_feature_override(
        &self,
        subscription_model_id: Uuid,
        feature_key: &str,
    ) -> AppResult<Option<TrialFeatureOverride>>;

    async fn get_entitlement_override(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
    ) -> AppResult<Option<TrialEntitlementOverride>>;

    async fn list_feature_overrides(
        &self,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<TrialFeatureOverride>>;

    async fn list_entitlement_overrides(
        &self,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<TrialEntitlementOverride>>;

    /// Unique per `(subscription_model_id, feature_key)`.
    async fn upsert_feature_override(
        &self,
        subscription_model_id: Uuid,
        feature_key: &str,
        enabled: bool,
    ) -> AppResult<TrialFeatureOverride>;

    /// Unique per `(subscription_model_id, entitlement_key)`.
    async fn upsert_entitlement_override(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
        value: &serde_json::Value,
    ) -> AppResult<TrialEntitlementOverride>;

    async fn delete_feature_override(&self, id: Uuid) -> AppResult<()>;

    async fn delete_entitlement_override(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait PricingRepo: Send + Sync {
    async fn get_plan(&self, id: Uuid) -> AppResult<Option<PricingPlan>>;

    async fn get_plan_by_tier(&self, tier: PlanTier) -> AppResult<Option<PricingPlan>>;

    async fn list_plans(&self) -> AppResult<Vec<PricingPlan>>;

    async fn create_plan(&self, input: &CreatePlanInput) -> AppResult<PricingPlan>;

    async fn get_model(&self, id: Uuid) -> AppResult<Option<SubscriptionModel>>;

    async fn list_models(&self, pricing_plan_id: Uuid) -> AppResult<Vec<SubscriptionModel>>;

    async fn create_model(&self, input: &CreateModelInput) -> AppResult<SubscriptionModel>;

    /// The single current price row for a model, if any.
    async fn current_price(
        &self,
        subscription_model_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Price>>;

    async fn list_prices(&self, subscription_model_id: Uuid) -> AppResult<Vec<Price>>;

    /// Closes the open price window and inserts the successor in one
    /// transaction. History is never edited in place.
    async fn supersede_price(&self, input: &NewPriceInput) -> AppResult<Price>;
}

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeatureInput {
    pub key: String,
    pub category: String,
    pub minimum_plan: PlanTier,
    #[serde(default)]
    pub requires_active_subscription: bool,
    #[serde(default)]
    pub requires_publishing_capability: bool,
    #[serde(default)]
    pub visible_in_trial: bool,
    #[serde(default)]
    pub usable_in_trial: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub default_for_new_dpps: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFeatureInput {
    pub category: Option<String>,
    pub minimum_plan: Option<PlanTier>,
    pub requires_active_subscription: Option<bool>,
    pub requires_publishing_capability: Option<bool>,
    pub visible_in_trial: Option<bool>,
    pub usable_in_trial: Option<bool>,
    pub enabled: Option<bool>,
    pub default_for_new_dpps: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanInput {
    pub name: String,
    pub tier: PlanTier,
    #[serde(default)]
    pub grants_publishing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateModelInput {
    pub pricing_plan_id: Uuid,
    pub interval: BillingInterval,
    #[serde(default)]
    pub trial_days: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPriceInput {
    pub subscription_model_id: Uuid,
    pub amount_cents: i32,
    pub currency: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

// ============================================================================
// Use Cases
// ============================================================================

/// Super-admin CRUD over the policy reference data: feature registry,
/// entitlement catalog, pricing hierarchy and trial overrides. Every
/// mutation is permission-checked against the platform matrix and leaves an
/// audit entry.
#[derive(Clone)]
pub struct PolicyAdminUseCases {
    features: Arc<dyn FeatureRegistryRepo>,
    entitlements: Arc<dyn EntitlementCatalogRepo>,
    overrides: Arc<dyn TrialOverrideRepo>,
    pricing: Arc<dyn PricingRepo>,
    audit: Arc<AuditUseCases>,
}

impl PolicyAdminUseCases {
    pub fn new(
        features: Arc<dyn FeatureRegistryRepo>,
        entitlements: Arc<dyn EntitlementCatalogRepo>,
        overrides: Arc<dyn TrialOverrideRepo>,
        pricing: Arc<dyn PricingRepo>,
        audit: Arc<AuditUseCases>,
    ) -> Self {
        Self {
            features,
            entitlements,
            overrides,
            pricing,
            audit,
        }
    }

    // ========================================================================
    // Feature Registry
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_features(&self, role: SuperAdminRole) -> AppResult<Vec<FeatureRegistryEntry>> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        self.features.list().await
    }

    #[instrument(skip(self))]
    pub async fn create_feature(
        &self,
        actor: AdminActor,
        input: CreateFeatureInput,
    ) -> AppResult<FeatureRegistryEntry> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Create)?;

        let key = input.key.trim().to_lowercase();
        if !is_valid_policy_key(&key) {
            return Err(AppError::InvalidInput(
                "Feature key must be lowercase alphanumeric with underscores, start with a letter, max 64 chars".into(),
            ));
        }
        if self.features.get_by_key(&key).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Feature '{key}' already exists"
            )));
        }

        let input = CreateFeatureInput { key, ..input };
        let entry = self.features.create(&input).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Create,
                AuditEntityType::FeatureRegistry,
                &entry.id.to_string(),
                None,
                serde_json::to_value(&entry).ok(),
            ))
            .await;
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn update_feature(
        &self,
        actor: AdminActor,
        id: Uuid,
        input: UpdateFeatureInput,
    ) -> AppResult<FeatureRegistryEntry> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Update)?;
        let updated = self.features.update(id, &input).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Update,
                AuditEntityType::FeatureRegistry,
                &id.to_string(),
                None,
                serde_json::to_value(&updated).ok(),
            ))
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_feature(&self, actor: AdminActor, id: Uuid) -> AppResult<()> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Delete)?;
        self.features.delete(id).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Delete,
                AuditEntityType::FeatureRegistry,
                &id.to_string(),
                None,
                None,
            ))
            .await;
        Ok(())
    }

    // ========================================================================
    // Entitlement Catalog
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_entitlements(&self, role: SuperAdminRole) -> AppResult<Vec<Entitlement>> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        self.entitlements.list().await
    }

    #[instrument(skip(self))]
    pub async fn create_entitlement(
        &self,
        actor: AdminActor,
        key: &str,
        kind: EntitlementKind,
        unit: Option<&str>,
    ) -> AppResult<Entitlement> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Create)?;

        let key = key.trim().to_lowercase();
        if !is_valid_policy_key(&key) {
            return Err(AppError::InvalidInput(
                "Entitlement key must be lowercase alphanumeric with underscores, start with a letter, max 64 chars".into(),
            ));
        }
        if self.entitlements.get_by_key(&key).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Entitlement '{key}' already exists"
            )));
        }

        let entitlement = self.entitlements.create(&key, kind, unit).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Create,
                AuditEntityType::Entitlement,
                &entitlement.id.to_string(),
                None,
                serde_json::to_value(&entitlement).ok(),
            ))
            .await;
        Ok(entitlement)
    }

    #[instrument(skip(self))]
    pub async fn list_plan_entitlements(
        &self,
        role: SuperAdminRole,
        pricing_plan_id: Uuid,
    ) -> AppResult<Vec<PlanEntitlement>> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        self.entitlements.list_plan_values(pricing_plan_id).await
    }

    #[instrument(skip(self))]
    pub async fn set_plan_entitlement(
        &self,
        actor: AdminActor,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
        value: serde_json::Value,
    ) -> AppResult<PlanEntitlement> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Update)?;

        let catalog = self
            .entitlements
            .get_by_key(entitlement_key)
            .await?
            .ok_or(AppError::NotFound)?;
        validate_entitlement_json(catalog.kind, &value)?;
        if self.pricing.get_plan(pricing_plan_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let old = self
            .entitlements
            .get_plan_value(pricing_plan_id, entitlement_key)
            .await?;
        let row = self
            .entitlements
            .upsert_plan_value(pricing_plan_id, entitlement_key, &value)
            .await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Update,
                AuditEntityType::Entitlement,
                &row.id.to_string(),
                old.and_then(|o| serde_json::to_value(&o).ok()),
                serde_json::to_value(&row).ok(),
            ))
            .await;
        Ok(row)
    }

    // ========================================================================
    // Pricing Hierarchy
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_plans(&self, role: SuperAdminRole) -> AppResult<Vec<PricingPlan>> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        self.pricing.list_plans().await
    }

    #[instrument(skip(self))]
    pub async fn create_plan(
        &self,
        actor: AdminActor,
        input: CreatePlanInput,
    ) -> AppResult<PricingPlan> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Create)?;
        let plan = self.pricing.create_plan(&input).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Create,
                AuditEntityType::PricingPlan,
                &plan.id.to_string(),
                None,
                serde_json::to_value(&plan).ok(),
            ))
            .await;
        Ok(plan)
    }

    #[instrument(skip(self))]
    pub async fn list_models(
        &self,
        role: SuperAdminRole,
        pricing_plan_id: Uuid,
    ) -> AppResult<Vec<SubscriptionModel>> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        self.pricing.list_models(pricing_plan_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_prices(
        &self,
        role: SuperAdminRole,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<Price>> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        self.pricing.list_prices(subscription_model_id).await
    }

    #[instrument(skip(self))]
    pub async fn create_model(
        &self,
        actor: AdminActor,
        input: CreateModelInput,
    ) -> AppResult<SubscriptionModel> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Create)?;
        if input.trial_days < 0 {
            return Err(AppError::InvalidInput("trial_days must be >= 0".into()));
        }
        if self.pricing.get_plan(input.pricing_plan_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        let model = self.pricing.create_model(&input).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Create,
                AuditEntityType::SubscriptionModel,
                &model.id.to_string(),
                None,
                serde_json::to_value(&model).ok(),
            ))
            .await;
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn add_price(&self, actor: AdminActor, input: NewPriceInput) -> AppResult<Price> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Create)?;
        if input.amount_cents < 0 {
            return Err(AppError::InvalidInput("amount_cents must be >= 0".into()));
        }
        if self
            .pricing
            .get_model(input.subscription_model_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound);
        }
        let price = self.pricing.supersede_price(&input).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Create,
                AuditEntityType::Price,
                &price.id.to_string(),
                None,
                serde_json::to_value(&price).ok(),
            ))
            .await;
        Ok(price)
    }

    // ========================================================================
    // Trial Overrides
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_trial_overrides(
        &self,
        role: SuperAdminRole,
        subscription_model_id: Uuid,
    ) -> AppResult<(Vec<TrialFeatureOverride>, Vec<TrialEntitlementOverride>)> {
        require_permission(role, AdminResource::Pricing, AdminAction::Read)?;
        let features = self
            .overrides
            .list_feature_overrides(subscription_model_id)
            .await?;
        let entitlements = self
            .overrides
            .list_entitlement_overrides(subscription_model_id)
            .await?;
        Ok((features, entitlements))
    }

    #[instrument(skip(self))]
    pub async fn set_trial_feature_override(
        &self,
        actor: AdminActor,
        subscription_model_id: Uuid,
        feature_key: &str,
        enabled: bool,
    ) -> AppResult<TrialFeatureOverride> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Update)?;

        if self.pricing.get_model(subscription_model_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        if self.features.get_by_key(feature_key).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let old = self
            .overrides
            .get_feature_override(subscription_model_id, feature_key)
            .await?;
        let row = self
            .overrides
            .upsert_feature_override(subscription_model_id, feature_key, enabled)
            .await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Update,
                AuditEntityType::TrialFeatureOverride,
                &row.id.to_string(),
                old.and_then(|o| serde_json::to_value(&o).ok()),
                serde_json::to_value(&row).ok(),
            ))
            .await;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn set_trial_entitlement_override(
        &self,
        actor: AdminActor,
        subscription_model_id: Uuid,
        entitlement_key: &str,
        value: serde_json::Value,
    ) -> AppResult<TrialEntitlementOverride> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Update)?;

        if self.pricing.get_model(subscription_model_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        let catalog = self
            .entitlements
            .get_by_key(entitlement_key)
            .await?
            .ok_or(AppError::NotFound)?;
        validate_entitlement_json(catalog.kind, &value)?;

        let old = self
            .overrides
            .get_entitlement_override(subscription_model_id, entitlement_key)
            .await?;
        let row = self
            .overrides
            .upsert_entitlement_override(subscription_model_id, entitlement_key, &value)
            .await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Update,
                AuditEntityType::TrialEntitlementOverride,
                &row.id.to_string(),
                old.and_then(|o| serde_json::to_value(&o).ok()),
                serde_json::to_value(&row).ok(),
            ))
            .await;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn delete_trial_feature_override(&self, actor: AdminActor, id: Uuid) -> AppResult<()> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Delete)?;
        self.overrides.delete_feature_override(id).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Delete,
                AuditEntityType::TrialFeatureOverride,
                &id.to_string(),
                None,
                None,
            ))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_trial_entitlement_override(
        &self,
        actor: AdminActor,
        id: Uuid,
    ) -> AppResult<()> {
        require_permission(actor.role, AdminResource::Pricing, AdminAction::Delete)?;
        self.overrides.delete_entitlement_override(id).await?;
        self.audit
            .record_best_effort(&self.admin_entry(
                &actor,
                AuditActionType::Delete,
                AuditEntityType::TrialEntitlementOverride,
                &id.to_string(),
                None,
                None,
            ))
            .await;
        Ok(())
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    fn admin_entry(
        &self,
        actor: &AdminActor,
        action_type: AuditActionType,
        entity_type: AuditEntityType,
        entity_id: &str,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> NewAuditLog {
        NewAuditLog {
            actor_id: Some(actor.id),
            actor_role: Some(actor.role.as_str().to_string()),
            organization_id: None,
            action_type,
            entity_type,
            entity_id: Some(entity_id.to_string()),
            old_value,
            new_value,
            source: AuditSource::Api,
            compliance_relevant: true,
            metadata: serde_json::Value::Null,
            ip_address: actor.ip_address.clone(),
        }
    }
}

/// Authenticated platform actor, as established by session verification.
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub id: Uuid,
    pub role: SuperAdminRole,
    pub ip_address: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

/// Feature and entitlement keys: lowercase alphanumeric with underscores,
/// start with a letter, max 64 chars.
fn is_valid_policy_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 64 {
        return false;
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Reject writes that would later fail type coercion in the resolver.
/// `null` stays legal on limit-kind entitlements (it means unlimited).
fn validate_entitlement_json(kind: EntitlementKind, value: &serde_json::Value) -> AppResult<()> {
    let ok = match kind {
        EntitlementKind::Limit => value.is_null() || value.as_i64().is_some(),
        EntitlementKind::Boolean => value.is_boolean(),
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Value {value} does not match entitlement kind"
        )))
    }
}
