use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::ports::clock::{Clock, SystemClock},
    application::use_cases::audit::{AuditLogRepo, AuditUseCases},
    application::use_cases::capabilities::CapabilityUseCases,
    application::use_cases::policy_admin::{
        EntitlementCatalogRepo, FeatureRegistryRepo, PolicyAdminUseCases, PricingRepo,
        TrialOverrideRepo,
    },
    application::use_cases::subscription_lifecycle::{
        OrganizationRepo, SubscriptionRepo, SubscriptionUseCases,
    },
    application::use_cases::super_admin_auth::{
        SuperAdminAuthUseCases, SuperAdminRepo, SuperAdminSessionRepo,
    },
    application::use_cases::tenant_permissions::{MembershipRepo, TenantPermissionUseCases},
    infra::{config::AppConfig, postgres_persistence},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let organization_repo = postgres_arc.clone() as Arc<dyn OrganizationRepo>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let feature_repo = postgres_arc.clone() as Arc<dyn FeatureRegistryRepo>;
    let entitlement_repo = postgres_arc.clone() as Arc<dyn EntitlementCatalogRepo>;
    let override_repo = postgres_arc.clone() as Arc<dyn TrialOverrideRepo>;
    let pricing_repo = postgres_arc.clone() as Arc<dyn PricingRepo>;
    let membership_repo = postgres_arc.clone() as Arc<dyn MembershipRepo>;
    let super_admin_repo = postgres_arc.clone() as Arc<dyn SuperAdminRepo>;
    let session_repo = postgres_arc.clone() as Arc<dyn SuperAdminSessionRepo>;
    let audit_repo = postgres_arc.clone() as Arc<dyn AuditLogRepo>;

    let audit_use_cases = Arc::new(AuditUseCases::new(audit_repo));

    let capability_use_cases = CapabilityUseCases::new(
        organization_repo.clone(),
        subscription_repo.clone(),
        feature_repo.clone(),
        entitlement_repo.clone(),
        override_repo.clone(),
        pricing_repo.clone(),
        clock.clone(),
    );

    let subscription_use_cases = SubscriptionUseCases::new(
        organization_repo,
        subscription_repo,
        pricing_repo.clone(),
        clock.clone(),
    );

    let tenant_permission_use_cases = TenantPermissionUseCases::new(membership_repo);

    let super_admin_auth_use_cases = SuperAdminAuthUseCases::new(
        super_admin_repo,
        session_repo,
        clock,
        config.jwt_secret.clone(),
        config.super_admin_session_ttl,
    );

    let policy_admin_use_cases = PolicyAdminUseCases::new(
        feature_repo,
        entitlement_repo,
        override_repo,
        pricing_repo,
        audit_use_cases.clone(),
    );

    Ok(AppState {
        config: Arc::new(config),
        capability_use_cases: Arc::new(capability_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        tenant_permission_use_cases: Arc::new(tenant_permission_use_cases),
        super_admin_auth_use_cases: Arc::new(super_admin_auth_use_cases),
        policy_admin_use_cases: Arc::new(policy_admin_use_cases),
        audit_use_cases,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "dpp_core=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
