//! In-memory repository doubles for use case and route tests. Each mock
//! mirrors the constraints the Postgres adapter enforces (unique keys,
//! transactional audit writes) so tests exercise the same error paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::audit::{AuditLogFilter, AuditLogPage, AuditLogRepo, NewAuditLog};
use crate::application::use_cases::policy_admin::{
    CreateFeatureInput, CreateModelInput, CreatePlanInput, EntitlementCatalogRepo,
    FeatureRegistryRepo, NewPriceInput, PricingRepo, TrialOverrideRepo, UpdateFeatureInput,
};
use crate::application::use_cases::subscription_lifecycle::{
    NewSubscription, OrganizationRepo, SubscriptionPatch, SubscriptionRepo,
};
use crate::application::use_cases::super_admin_auth::{
    NewSuperAdminSession, SuperAdminRepo, SuperAdminSessionRepo,
};
use crate::application::use_cases::tenant_permissions::MembershipRepo;
use crate::domain::entities::audit::AuditLog;
use crate::domain::entities::entitlement::{Entitlement, EntitlementKind, PlanEntitlement};
use crate::domain::entities::feature_registry::FeatureRegistryEntry;
use crate::domain::entities::membership::{Membership, OrgRole};
use crate::domain::entities::organization::Organization;
use crate::domain::entities::pricing::{PlanTier, Price, PricingPlan, SubscriptionModel};
use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};
use crate::domain::entities::super_admin::{SuperAdmin, SuperAdminSession};
use crate::domain::entities::trial_override::{TrialEntitlementOverride, TrialFeatureOverride};

// ============================================================================
// Organizations
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrganizations {
    rows: Mutex<HashMap<Uuid, Organization>>,
}

impl InMemoryOrganizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, org: Organization) {
        self.rows.lock().unwrap().insert(org.id, org);
    }
}

#[async_trait]
impl OrganizationRepo for InMemoryOrganizations {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Keyed by organization, matching the unique constraint on the real table.
/// Re-seeding an organization replaces its row.
#[derive(Default)]
pub struct InMemorySubscriptions {
    rows: Mutex<HashMap<Uuid, Subscription>>,
    audit: Mutex<Vec<NewAuditLog>>,
}

impl InMemorySubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, sub: Subscription) {
        self.rows.lock().unwrap().insert(sub.organization_id, sub);
    }

    pub fn audit_entries(&self) -> Vec<NewAuditLog> {
        self.audit.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptions {
    async fn get_by_organization(&self, organization_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.rows.lock().unwrap().get(&organization_id).cloned())
    }

    async fn create(&self, input: &NewSubscription, audit: &NewAuditLog) -> AppResult<Subscription> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&input.organization_id) {
            return Err(AppError::Conflict(
                "Organization already has a subscription".into(),
            ));
        }
        let sub = Subscription {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            plan: input.plan,
            status: input.status,
            subscription_model_id: input.subscription_model_id,
            trial_started_at: input.trial_started_at,
            trial_expires_at: input.trial_expires_at,
            current_period_start: input.current_period_start,
            current_period_end: input.current_period_end,
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        rows.insert(sub.organization_id, sub.clone());
        self.audit.lock().unwrap().push(audit.clone());
        Ok(sub)
    }

    async fn apply(
        &self,
        id: Uuid,
        patch: &SubscriptionPatch,
        audit: &NewAuditLog,
    ) -> AppResult<Subscription> {
        let mut rows = self.rows.lock().unwrap();
        let sub = rows
            .values_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound)?;
        sub.status = patch.status;
        sub.plan = patch.plan;
        sub.subscription_model_id = patch.subscription_model_id;
        sub.trial_started_at = patch.trial_started_at;
        sub.trial_expires_at = patch.trial_expires_at;
        sub.current_period_start = patch.current_period_start;
        sub.current_period_end = patch.current_period_end;
        sub.cancel_at_period_end = patch.cancel_at_period_end;
        sub.canceled_at = patch.canceled_at;
        sub.updated_at = Some(Utc::now());
        let updated = sub.clone();
        self.audit.lock().unwrap().push(audit.clone());
        Ok(updated)
    }

    async fn list_trial_invalid(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::TrialActive
                    && (s.subscription_model_id.is_none()
                        || s.trial_expires_at.is_none()
                        || s.trial_expires_at.map(|t| t <= now).unwrap_or(false))
            })
            .cloned()
            .collect())
    }
}

// ============================================================================
// Feature Registry
// ============================================================================

#[derive(Default)]
pub struct InMemoryFeatureRegistry {
    rows: Mutex<HashMap<String, FeatureRegistryEntry>>,
}

impl InMemoryFeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, entry: FeatureRegistryEntry) {
        self.rows.lock().unwrap().insert(entry.key.clone(), entry);
    }
}

#[async_trait]
impl FeatureRegistryRepo for InMemoryFeatureRegistry {
    async fn list(&self) -> AppResult<Vec<FeatureRegistryEntry>> {
        let mut rows: Vec<_> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn list_enabled(&self) -> AppResult<Vec<FeatureRegistryEntry>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.enabled)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn get_by_key(&self, key: &str) -> AppResult<Option<FeatureRegistryEntry>> {
        Ok(self.rows.lock().unwrap().get(key).cloned())
    }

    async fn create(&self, input: &CreateFeatureInput) -> AppResult<FeatureRegistryEntry> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&input.key) {
            return Err(AppError::Conflict(format!(
                "Feature '{}' already exists",
                input.key
            )));
        }
        let entry = FeatureRegistryEntry {
            id: Uuid::new_v4(),
            key: input.key.clone(),
            category: input.category.clone(),
            minimum_plan: input.minimum_plan,
            requires_active_subscription: input.requires_active_subscription,
            requires_publishing_capability: input.requires_publishing_capability,
            visible_in_trial: input.visible_in_trial,
            usable_in_trial: input.usable_in_trial,
            enabled: input.enabled,
            default_for_new_dpps: input.default_for_new_dpps,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        rows.insert(entry.key.clone(), entry.clone());
        Ok(entry)
    }

    async fn update(&self, id: Uuid, input: &UpdateFeatureInput) -> AppResult<FeatureRegistryEntry> {
        let mut rows = self.rows.lock().unwrap();
        let entry = rows
            .values_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;
        if let Some(category) = &input.category {
            entry.category = category.clone();
        }
        if let Some(minimum_plan) = input.minimum_plan {
            entry.minimum_plan = minimum_plan;
        }
        if let Some(v) = input.requires_active_subscription {
            entry.requires_active_subscription = v;
        }
        if let Some(v) = input.requires_publishing_capability {
            entry.requires_publishing_capability = v;
        }
        if let Some(v) = input.visible_in_trial {
            entry.visible_in_trial = v;
        }
        if let Some(v) = input.usable_in_trial {
            entry.usable_in_trial = v;
        }
        if let Some(v) = input.enabled {
            entry.enabled = v;
        }
        if let Some(v) = input.default_for_new_dpps {
            entry.default_for_new_dpps = v;
        }
        entry.updated_at = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let key = rows
            .values()
            .find(|e| e.id == id)
            .map(|e| e.key.clone())
            .ok_or(AppError::NotFound)?;
        rows.remove(&key);
        Ok(())
    }
}

// ============================================================================
// Entitlement Catalog
// ============================================================================

#[derive(Default)]
pub struct InMemoryEntitlementCatalog {
    catalog: Mutex<HashMap<String, Entitlement>>,
    plan_values: Mutex<HashMap<(Uuid, String), PlanEntitlement>>,
}

impl InMemoryEntitlementCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, kind: EntitlementKind) {
        self.catalog.lock().unwrap().insert(
            key.to_string(),
            Entitlement {
                id: Uuid::new_v4(),
                key: key.to_string(),
                kind,
                unit: None,
                created_at: Some(Utc::now()),
                updated_at: Some(Utc::now()),
            },
        );
    }

    pub fn seed_plan_value(&self, pricing_plan_id: Uuid, key: &str, value: serde_json::Value) {
        self.plan_values.lock().unwrap().insert(
            (pricing_plan_id, key.to_string()),
            PlanEntitlement {
                id: Uuid::new_v4(),
                pricing_plan_id,
                entitlement_key: key.to_string(),
                value,
                created_at: Some(Utc::now()),
            },
        );
    }
}

#[async_trait]
impl EntitlementCatalogRepo for InMemoryEntitlementCatalog {
    async fn list(&self) -> AppResult<Vec<Entitlement>> {
        let mut rows: Vec<_> = self.catalog.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn get_by_key(&self, key: &str) -> AppResult<Option<Entitlement>> {
        Ok(self.catalog.lock().unwrap().get(key).cloned())
    }

    async fn create(
        &self,
        key: &str,
        kind: EntitlementKind,
        unit: Option<&str>,
    ) -> AppResult<Entitlement> {
        let mut catalog = self.catalog.lock().unwrap();
        if catalog.contains_key(key) {
            return Err(AppError::Conflict(format!(
                "Entitlement '{key}' already exists"
            )));
        }
        let entitlement = Entitlement {
            id: Uuid::new_v4(),
            key: key.to_string(),
            kind,
            unit: unit.map(String::from),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        catalog.insert(key.to_string(), entitlement.clone());
        Ok(entitlement)
    }

    async fn upsert_plan_value(
        &self,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
        value: &serde_json::Value,
    ) -> AppResult<PlanEntitlement> {
        let mut plan_values = self.plan_values.lock().unwrap();
        let row = plan_values
            .entry((pricing_plan_id, entitlement_key.to_string()))
            .and_modify(|row| row.value = value.clone())
            .or_insert_with(|| PlanEntitlement {
                id: Uuid::new_v4(),
                pricing_plan_id,
                entitlement_key: entitlement_key.to_string(),
                value: value.clone(),
                created_at: Some(Utc::now()),
            });
        Ok(row.clone())
    }

    async fn get_plan_value(
        &self,
        pricing_plan_id: Uuid,
        entitlement_key: &str,
    ) -> AppResult<Option<PlanEntitlement>> {
        Ok(self
            .plan_values
            .lock()
            .unwrap()
            .get(&(pricing_plan_id, entitlement_key.to_string()))
            .cloned())
    }

    async fn list_plan_values(&self, pricing_plan_id: Uuid) -> AppResult<Vec<PlanEntitlement>> {
        let mut rows: Vec<_> = self
            .plan_values
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.pricing_plan_id == pricing_plan_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.entitlement_key.cmp(&b.entitlement_key));
        Ok(rows)
    }
}

// ============================================================================
// Trial Overrides
// ============================================================================

#[derive(Default)]
pub struct InMemoryTrialOverrides {
    features: Mutex<HashMap<(Uuid, String), TrialFeatureOverride>>,
    entitlements: Mutex<HashMap<(Uuid, String), TrialEntitlementOverride>>,
}

impl InMemoryTrialOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_feature(&self, subscription_model_id: Uuid, feature_key: &str, enabled: bool) {
        self.features.lock().unwrap().insert(
            (subscription_model_id, feature_key.to_string()),
            TrialFeatureOverride {
                id: Uuid::new_v4(),
                subscription_model_id,
                feature_key: feature_key.to_string(),
                enabled,
                created_at: Some(Utc::now()),
            },
        );
    }

    pub fn seed_entitlement(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
        value: serde_json::Value,
    ) {
        self.entitlements.lock().unwrap().insert(
            (subscription_model_id, entitlement_key.to_string()),
            TrialEntitlementOverride {
                id: Uuid::new_v4(),
                subscription_model_id,
                entitlement_key: entitlement_key.to_string(),
                value,
                created_at: Some(Utc::now()),
            },
        );
    }
}

#[async_trait]
impl TrialOverrideRepo for InMemoryTrialOverrides {
    async fn get_feature_override(
        &self,
        subscription_model_id: Uuid,
        feature_key: &str,
    ) -> AppResult<Option<TrialFeatureOverride>> {
        Ok(self
            .features
            .lock()
            .unwrap()
            .get(&(subscription_model_id, feature_key.to_string()))
            .cloned())
    }

    async fn get_entitlement_override(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
    ) -> AppResult<Option<TrialEntitlementOverride>> {
        Ok(self
            .entitlements
            .lock()
            .unwrap()
            .get(&(subscription_model_id, entitlement_key.to_string()))
            .cloned())
    }

    async fn list_feature_overrides(
        &self,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<TrialFeatureOverride>> {
        let mut rows: Vec<_> = self
            .features
            .lock()
            .unwrap()
            .values()
            .filter(|ov| ov.subscription_model_id == subscription_model_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.feature_key.cmp(&b.feature_key));
        Ok(rows)
    }

    async fn list_entitlement_overrides(
        &self,
        subscription_model_id: Uuid,
    ) -> AppResult<Vec<TrialEntitlementOverride>> {
        let mut rows: Vec<_> = self
            .entitlements
            .lock()
            .unwrap()
            .values()
            .filter(|ov| ov.subscription_model_id == subscription_model_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.entitlement_key.cmp(&b.entitlement_key));
        Ok(rows)
    }

    async fn upsert_feature_override(
        &self,
        subscription_model_id: Uuid,
        feature_key: &str,
        enabled: bool,
    ) -> AppResult<TrialFeatureOverride> {
        let mut features = self.features.lock().unwrap();
        let row = features
            .entry((subscription_model_id, feature_key.to_string()))
            .and_modify(|row| row.enabled = enabled)
            .or_insert_with(|| TrialFeatureOverride {
                id: Uuid::new_v4(),
                subscription_model_id,
                feature_key: feature_key.to_string(),
                enabled,
                created_at: Some(Utc::now()),
            });
        Ok(row.clone())
    }

    async fn upsert_entitlement_override(
        &self,
        subscription_model_id: Uuid,
        entitlement_key: &str,
        value: &serde_json::Value,
    ) -> AppResult<TrialEntitlementOverride> {
        let mut entitlements = self.entitlements.lock().unwrap();
        let row = entitlements
            .entry((subscription_model_id, entitlement_key.to_string()))
            .and_modify(|row| row.value = value.clone())
            .or_insert_with(|| TrialEntitlementOverride {
                id: Uuid::new_v4(),
                subscription_model_id,
                entitlement_key: entitlement_key.to_string(),
                value: value.clone(),
                created_at: Some(Utc::now()),
            });
        Ok(row.clone())
    }

    async fn delete_feature_override(&self, id: Uuid) -> AppResult<()> {
        let mut features = self.features.lock().unwrap();
        let key = features
            .iter()
            .find(|(_, ov)| ov.id == id)
            .map(|(k, _)| k.clone())
            .ok_or(AppError::NotFound)?;
        features.remove(&key);
        Ok(())
    }

    async fn delete_entitlement_override(&self, id: Uuid) -> AppResult<()> {
        let mut entitlements = self.entitlements.lock().unwrap();
        let key = entitlements
            .iter()
            .find(|(_, ov)| ov.id == id)
            .map(|(k, _)| k.clone())
            .ok_or(AppError::NotFound)?;
        entitlements.remove(&key);
        Ok(())
    }
}

// ============================================================================
// Pricing
// ============================================================================

#[derive(Default)]
pub struct InMemoryPricing {
    plans: Mutex<HashMap<Uuid, PricingPlan>>,
    models: Mutex<HashMap<Uuid, SubscriptionModel>>,
    prices: Mutex<Vec<Price>>,
}

impl InMemoryPricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_plan(&self, plan: PricingPlan) {
        self.plans.lock().unwrap().insert(plan.id, plan);
    }

    pub fn seed_model(&self, model: SubscriptionModel) {
        self.models.lock().unwrap().insert(model.id, model);
    }
}

#[async_trait]
impl PricingRepo for InMemoryPricing {
    async fn get_plan(&self, id: Uuid) -> AppResult<Option<PricingPlan>> {
        Ok(self.plans.lock().unwrap().get(&id).cloned())
    }

    async fn get_plan_by_tier(&self, tier: PlanTier) -> AppResult<Option<PricingPlan>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .values()
            .find(|p| p.tier == tier)
            .cloned())
    }

    async fn list_plans(&self) -> AppResult<Vec<PricingPlan>> {
        let mut rows: Vec<_> = self.plans.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|p| p.tier.rank());
        Ok(rows)
    }

    async fn create_plan(&self, input: &CreatePlanInput) -> AppResult<PricingPlan> {
        let plan = PricingPlan {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            tier: input.tier,
            grants_publishing: input.grants_publishing,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.plans.lock().unwrap().insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn get_model(&self, id: Uuid) -> AppResult<Option<SubscriptionModel>> {
        Ok(self.models.lock().unwrap().get(&id).cloned())
    }

    async fn list_models(&self, pricing_plan_id: Uuid) -> AppResult<Vec<SubscriptionModel>> {
        Ok(self
            .models
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.pricing_plan_id == pricing_plan_id)
            .cloned()
            .collect())
    }

    async fn create_model(&self, input: &CreateModelInput) -> AppResult<SubscriptionModel> {
        let model = SubscriptionModel {
            id: Uuid::new_v4(),
            pricing_plan_id: input.pricing_plan_id,
            interval: input.interval,
            trial_days: input.trial_days,
            is_active: true,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.models.lock().unwrap().insert(model.id, model.clone());
        Ok(model)
    }

    async fn current_price(
        &self,
        subscription_model_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Price>> {
        Ok(self
            .prices
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.subscription_model_id == subscription_model_id && p.is_current(now))
            .cloned())
    }

    async fn list_prices(&self, subscription_model_id: Uuid) -> AppResult<Vec<Price>> {
        let mut rows: Vec<_> = self
            .prices
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.subscription_model_id == subscription_model_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| std::cmp::Reverse(p.valid_from));
        Ok(rows)
    }

    async fn supersede_price(&self, input: &NewPriceInput) -> AppResult<Price> {
        let mut prices = self.prices.lock().unwrap();
        for price in prices.iter_mut() {
            if price.subscription_model_id == input.subscription_model_id
                && price.valid_to.is_none()
            {
                price.valid_to = Some(input.valid_from);
            }
        }
        let price = Price {
            id: Uuid::new_v4(),
            subscription_model_id: input.subscription_model_id,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            is_active: true,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            created_at: Some(Utc::now()),
        };
        prices.push(price.clone());
        Ok(price)
    }
}

// ============================================================================
// Memberships
// ============================================================================

#[derive(Default)]
pub struct InMemoryMemberships {
    rows: Mutex<HashMap<Uuid, Membership>>,
    audit: Mutex<Vec<NewAuditLog>>,
}

impl InMemoryMemberships {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, membership: Membership) {
        self.rows.lock().unwrap().insert(membership.id, membership);
    }

    pub fn audit_entries(&self) -> Vec<NewAuditLog> {
        self.audit.lock().unwrap().clone()
    }
}

#[async_trait]
impl MembershipRepo for InMemoryMemberships {
    async fn get(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<Option<Membership>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .cloned())
    }

    async fn list_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Membership>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.user_id);
        Ok(rows)
    }

    async fn delete_with_audit(&self, id: Uuid, audit: &NewAuditLog) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        rows.remove(&id).ok_or(AppError::NotFound)?;
        self.audit.lock().unwrap().push(audit.clone());
        Ok(())
    }

    async fn update_role_with_audit(
        &self,
        id: Uuid,
        role: OrgRole,
        audit: &NewAuditLog,
    ) -> AppResult<Membership> {
        let mut rows = self.rows.lock().unwrap();
        let membership = rows.get_mut(&id).ok_or(AppError::NotFound)?;
        membership.role = role;
        let updated = membership.clone();
        self.audit.lock().unwrap().push(audit.clone());
        Ok(updated)
    }
}

// ============================================================================
// Super Admins
// ============================================================================

/// Re-seeding an existing id replaces the row, so tests can deactivate an
/// admin mid-flight.
#[derive(Default)]
pub struct InMemorySuperAdmins {
    rows: Mutex<HashMap<Uuid, SuperAdmin>>,
}

impl InMemorySuperAdmins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, admin: SuperAdmin) {
        self.rows.lock().unwrap().insert(admin.id, admin);
    }
}

#[async_trait]
impl SuperAdminRepo for InMemorySuperAdmins {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<SuperAdmin>> {
        let email = email.to_lowercase();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email.to_lowercase() == email)
            .cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SuperAdmin>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let admin = rows.get_mut(&id).ok_or(AppError::NotFound)?;
        admin.last_login_at = Some(at);
        Ok(())
    }
}

// ============================================================================
// Super Admin Sessions
// ============================================================================

#[derive(Default)]
pub struct InMemorySuperAdminSessions {
    rows: Mutex<HashMap<String, SuperAdminSession>>,
}

impl InMemorySuperAdminSessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SuperAdminSessionRepo for InMemorySuperAdminSessions {
    async fn create(&self, session: &NewSuperAdminSession) -> AppResult<SuperAdminSession> {
        let row = SuperAdminSession {
            id: Uuid::new_v4(),
            super_admin_id: session.super_admin_id,
            token_hash: session.token_hash.clone(),
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            created_at: Some(Utc::now()),
        };
        self.rows
            .lock()
            .unwrap()
            .insert(row.token_hash.clone(), row.clone());
        Ok(row)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> AppResult<Option<SuperAdminSession>> {
        Ok(self.rows.lock().unwrap().get(token_hash).cloned())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> AppResult<()> {
        self.rows.lock().unwrap().remove(token_hash);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, session| session.expires_at > now);
        Ok((before - rows.len()) as u64)
    }
}

// ============================================================================
// Audit Logs
// ============================================================================

#[derive(Default)]
pub struct InMemoryAuditLogs {
    rows: Mutex<Vec<AuditLog>>,
}

impl InMemoryAuditLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, entry: AuditLog) {
        self.rows.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<AuditLog> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLogRepo for InMemoryAuditLogs {
    async fn insert(&self, entry: &NewAuditLog) -> AppResult<Uuid> {
        let row = AuditLog {
            id: Uuid::new_v4(),
            actor_id: entry.actor_id,
            actor_role: entry.actor_role.clone(),
            organization_id: entry.organization_id,
            action_type: entry.action_type,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id.clone(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
            source: entry.source,
            compliance_relevant: entry.compliance_relevant,
            metadata: entry.metadata.clone(),
            ip_address: entry.ip_address.clone(),
            created_at: Utc::now(),
        };
        let id = row.id;
        self.rows.lock().unwrap().push(row);
        Ok(id)
    }

    async fn query(&self, filter: &AuditLogFilter) -> AppResult<AuditLogPage> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                filter
                    .organization_id
                    .map(|v| e.organization_id == Some(v))
                    .unwrap_or(true)
                    && filter.actor_id.map(|v| e.actor_id == Some(v)).unwrap_or(true)
                    && filter
                        .entity_type
                        .map(|v| e.entity_type == v)
                        .unwrap_or(true)
                    && filter
                        .entity_id
                        .as_ref()
                        .map(|v| e.entity_id.as_ref() == Some(v))
                        .unwrap_or(true)
                    && filter
                        .action_type
                        .map(|v| e.action_type == v)
                        .unwrap_or(true)
                    && filter.date_from.map(|v| e.created_at >= v).unwrap_or(true)
                    && filter.date_to.map(|v| e.created_at <= v).unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|e| std::cmp::Reverse(e.created_at));

        let total = rows.len() as i64;
        let page = filter.page();
        let per_page = filter.per_page();
        let offset = ((page - 1) * per_page) as usize;
        let entries: Vec<_> = rows
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();
        Ok(AuditLogPage {
            entries,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }
}
