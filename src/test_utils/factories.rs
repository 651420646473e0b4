//! Entity factories with sensible defaults. Each takes a mutator closure so
//! tests only spell out what they care about.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::use_cases::super_admin_auth::hash_password;
use crate::domain::entities::feature_registry::FeatureRegistryEntry;
use crate::domain::entities::membership::{Membership, OrgRole};
use crate::domain::entities::organization::Organization;
use crate::domain::entities::pricing::{BillingInterval, PlanTier, PricingPlan, SubscriptionModel};
use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};
use crate::domain::entities::super_admin::{SuperAdmin, SuperAdminRole};

/// Fixed reference instant shared by factories and the test clock.
pub fn test_now() -> DateTime<Utc> {
    "2025-03-01T12:00:00Z".parse().unwrap()
}

pub fn create_test_organization(mutate: impl FnOnce(&mut Organization)) -> Organization {
    let mut org = Organization {
        id: Uuid::new_v4(),
        name: "Test Organization".to_string(),
        created_at: Some(test_now()),
        updated_at: Some(test_now()),
    };
    mutate(&mut org);
    org
}

pub fn create_test_subscription(
    organization_id: Uuid,
    mutate: impl FnOnce(&mut Subscription),
) -> Subscription {
    let mut sub = Subscription {
        id: Uuid::new_v4(),
        organization_id,
        plan: None,
        status: SubscriptionStatus::NoSubscription,
        subscription_model_id: None,
        trial_started_at: None,
        trial_expires_at: None,
        current_period_start: None,
        current_period_end: None,
        cancel_at_period_end: false,
        canceled_at: None,
        created_at: Some(test_now()),
        updated_at: Some(test_now()),
    };
    mutate(&mut sub);
    sub
}

pub fn create_test_feature(
    key: &str,
    mutate: impl FnOnce(&mut FeatureRegistryEntry),
) -> FeatureRegistryEntry {
    let mut entry = FeatureRegistryEntry {
        id: Uuid::new_v4(),
        key: key.to_string(),
        category: "general".to_string(),
        minimum_plan: PlanTier::Basic,
        requires_active_subscription: false,
        requires_publishing_capability: false,
        visible_in_trial: false,
        usable_in_trial: false,
        enabled: true,
        default_for_new_dpps: false,
        created_at: Some(test_now()),
        updated_at: Some(test_now()),
    };
    mutate(&mut entry);
    entry
}

pub fn create_test_plan(tier: PlanTier, mutate: impl FnOnce(&mut PricingPlan)) -> PricingPlan {
    let mut plan = PricingPlan {
        id: Uuid::new_v4(),
        name: format!("{} plan", tier.as_str()),
        tier,
        grants_publishing: true,
        created_at: Some(test_now()),
        updated_at: Some(test_now()),
    };
    mutate(&mut plan);
    plan
}

pub fn create_test_model(
    pricing_plan_id: Uuid,
    mutate: impl FnOnce(&mut SubscriptionModel),
) -> SubscriptionModel {
    let mut model = SubscriptionModel {
        id: Uuid::new_v4(),
        pricing_plan_id,
        interval: BillingInterval::Monthly,
        trial_days: 0,
        is_active: true,
        created_at: Some(test_now()),
        updated_at: Some(test_now()),
    };
    mutate(&mut model);
    model
}

pub fn create_test_membership(
    organization_id: Uuid,
    mutate: impl FnOnce(&mut Membership),
) -> Membership {
    let mut membership = Membership {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        organization_id,
        role: OrgRole::Member,
        created_at: Some(test_now()),
    };
    mutate(&mut membership);
    membership
}

/// Default login password is "correct horse".
pub fn create_test_super_admin(mutate: impl FnOnce(&mut SuperAdmin)) -> SuperAdmin {
    let salt = "test-salt";
    let mut admin = SuperAdmin {
        id: Uuid::new_v4(),
        email: "admin@example.com".to_string(),
        name: Some("Test Admin".to_string()),
        password_salt: salt.to_string(),
        password_hash: hash_password(salt, "correct horse"),
        role: SuperAdminRole::SuperAdmin,
        is_active: true,
        last_login_at: None,
        created_at: Some(test_now()),
    };
    mutate(&mut admin);
    admin
}
