//! Builds a fully wired `AppState` over in-memory repositories, for route
//! tests with `axum_test::TestServer`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum_test::TestServer;
use chrono::Duration;
use secrecy::SecretString;
use uuid::Uuid;

use crate::adapters::http::app_state::AppState;
use crate::application::jwt;
use crate::application::ports::clock::{Clock, FixedClock};
use crate::application::use_cases::audit::{AuditLogRepo, AuditUseCases};
use crate::application::use_cases::capabilities::CapabilityUseCases;
use crate::application::use_cases::policy_admin::{
    EntitlementCatalogRepo, FeatureRegistryRepo, PolicyAdminUseCases, PricingRepo, TrialOverrideRepo,
};
use crate::application::use_cases::subscription_lifecycle::{
    OrganizationRepo, SubscriptionRepo, SubscriptionUseCases,
};
use crate::application::use_cases::super_admin_auth::{
    SuperAdminAuthUseCases, SuperAdminRepo, SuperAdminSessionRepo,
};
use crate::application::use_cases::tenant_permissions::{MembershipRepo, TenantPermissionUseCases};
use crate::domain::entities::audit::{
    AuditActionType, AuditEntityType, AuditLog, AuditSource,
};
use crate::domain::entities::entitlement::EntitlementKind;
use crate::domain::entities::feature_registry::FeatureRegistryEntry;
use crate::domain::entities::membership::Membership;
use crate::domain::entities::organization::Organization;
use crate::domain::entities::pricing::{PricingPlan, SubscriptionModel};
use crate::domain::entities::subscription::Subscription;
use crate::domain::entities::super_admin::SuperAdmin;
use crate::infra::config::AppConfig;
use crate::test_utils::factories::test_now;
use crate::test_utils::mocks::{
    InMemoryAuditLogs, InMemoryEntitlementCatalog, InMemoryFeatureRegistry, InMemoryMemberships,
    InMemoryOrganizations, InMemoryPricing, InMemorySubscriptions, InMemorySuperAdminSessions,
    InMemorySuperAdmins, InMemoryTrialOverrides,
};

pub struct TestAppStateBuilder {
    organizations: Arc<InMemoryOrganizations>,
    subscriptions: Arc<InMemorySubscriptions>,
    features: Arc<InMemoryFeatureRegistry>,
    entitlements: Arc<InMemoryEntitlementCatalog>,
    overrides: Arc<InMemoryTrialOverrides>,
    pricing: Arc<InMemoryPricing>,
    memberships: Arc<InMemoryMemberships>,
    admins: Arc<InMemorySuperAdmins>,
    sessions: Arc<InMemorySuperAdminSessions>,
    audit_logs: Arc<InMemoryAuditLogs>,
    clock: Arc<FixedClock>,
    config: Arc<AppConfig>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        let config = AppConfig {
            jwt_secret: SecretString::new("test-secret".into()),
            access_token_ttl: Duration::hours(1),
            super_admin_session_ttl: Duration::hours(8),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            trust_proxy: false,
        };
        Self {
            organizations: Arc::new(InMemoryOrganizations::new()),
            subscriptions: Arc::new(InMemorySubscriptions::new()),
            features: Arc::new(InMemoryFeatureRegistry::new()),
            entitlements: Arc::new(InMemoryEntitlementCatalog::new()),
            overrides: Arc::new(InMemoryTrialOverrides::new()),
            pricing: Arc::new(InMemoryPricing::new()),
            memberships: Arc::new(InMemoryMemberships::new()),
            admins: Arc::new(InMemorySuperAdmins::new()),
            sessions: Arc::new(InMemorySuperAdminSessions::new()),
            audit_logs: Arc::new(InMemoryAuditLogs::new()),
            clock: Arc::new(FixedClock::at(test_now())),
            config: Arc::new(config),
        }
    }

    pub fn with_organization(self, org: Organization) -> Self {
        self.organizations.seed(org);
        self
    }

    pub fn with_subscription(self, sub: Subscription) -> Self {
        self.subscriptions.seed(sub);
        self
    }

    pub fn with_feature(self, entry: FeatureRegistryEntry) -> Self {
        self.features.seed(entry);
        self
    }

    pub fn with_plan(self, plan: PricingPlan) -> Self {
        self.pricing.seed_plan(plan);
        self
    }

    pub fn with_model(self, model: SubscriptionModel) -> Self {
        self.pricing.seed_model(model);
        self
    }

    /// Registers a limit-kind entitlement and its value for one plan.
    pub fn with_limit_entitlement(
        self,
        key: &str,
        pricing_plan_id: Uuid,
        value: serde_json::Value,
    ) -> Self {
        self.entitlements.seed(key, EntitlementKind::Limit);
        self.entitlements.seed_plan_value(pricing_plan_id, key, value);
        self
    }

    pub fn with_membership(self, membership: Membership) -> Self {
        self.memberships.seed(membership);
        self
    }

    pub fn with_super_admin(self, admin: SuperAdmin) -> Self {
        self.admins.seed(admin);
        self
    }

    /// Seeds one stored audit row carrying the given raw IP.
    pub fn with_audit_entry(self, ip_address: &str) -> Self {
        self.audit_logs.seed(AuditLog {
            id: Uuid::new_v4(),
            actor_id: Some(Uuid::new_v4()),
            actor_role: Some("super_admin".to_string()),
            organization_id: None,
            action_type: AuditActionType::Update,
            entity_type: AuditEntityType::Subscription,
            entity_id: None,
            old_value: None,
            new_value: None,
            source: AuditSource::Api,
            compliance_relevant: true,
            metadata: serde_json::Value::Null,
            ip_address: Some(ip_address.to_string()),
            created_at: test_now(),
        });
        self
    }

    pub fn build(self) -> AppState {
        let organizations: Arc<dyn OrganizationRepo> = self.organizations;
        let subscriptions: Arc<dyn SubscriptionRepo> = self.subscriptions;
        let features: Arc<dyn FeatureRegistryRepo> = self.features;
        let entitlements: Arc<dyn EntitlementCatalogRepo> = self.entitlements;
        let overrides: Arc<dyn TrialOverrideRepo> = self.overrides;
        let pricing: Arc<dyn PricingRepo> = self.pricing;
        let memberships: Arc<dyn MembershipRepo> = self.memberships;
        let admins: Arc<dyn SuperAdminRepo> = self.admins;
        let sessions: Arc<dyn SuperAdminSessionRepo> = self.sessions;
        let audit_repo: Arc<dyn AuditLogRepo> = self.audit_logs;
        let clock: Arc<dyn Clock> = self.clock;

        let audit_use_cases = Arc::new(AuditUseCases::new(audit_repo));
        let capability_use_cases = Arc::new(CapabilityUseCases::new(
            organizations.clone(),
            subscriptions.clone(),
            features.clone(),
            entitlements.clone(),
            overrides.clone(),
            pricing.clone(),
            clock.clone(),
        ));
        let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
            organizations,
            subscriptions,
            pricing.clone(),
            clock.clone(),
        ));
        let tenant_permission_use_cases = Arc::new(TenantPermissionUseCases::new(memberships));
        let super_admin_auth_use_cases = Arc::new(SuperAdminAuthUseCases::new(
            admins,
            sessions,
            clock,
            self.config.jwt_secret.clone(),
            self.config.super_admin_session_ttl,
        ));
        let policy_admin_use_cases = Arc::new(PolicyAdminUseCases::new(
            features,
            entitlements,
            overrides,
            pricing,
            audit_use_cases.clone(),
        ));

        AppState {
            config: self.config,
            capability_use_cases,
            subscription_use_cases,
            tenant_permission_use_cases,
            super_admin_auth_use_cases,
            policy_admin_use_cases,
            audit_use_cases,
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Access token for a tenant user, signed with the builder's secret.
pub fn tenant_token(builder: &TestAppStateBuilder, user_id: Uuid) -> String {
    jwt::issue(user_id, &builder.config.jwt_secret, time::Duration::hours(1)).unwrap()
}

/// Logs a seeded test admin in through the login route and returns the
/// bearer token. Assumes the factory default password.
pub async fn admin_login(server: &TestServer, email: &str) -> String {
    let response = server
        .post("/auth/login")
        .json(&serde_json::json!({ "email": email, "password": "correct horse" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["token"].as_str().unwrap().to_string()
}
