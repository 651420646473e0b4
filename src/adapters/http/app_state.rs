use std::sync::Arc;

use crate::{
    application::use_cases::audit::AuditUseCases,
    application::use_cases::capabilities::CapabilityUseCases,
    application::use_cases::policy_admin::PolicyAdminUseCases,
    application::use_cases::subscription_lifecycle::SubscriptionUseCases,
    application::use_cases::super_admin_auth::SuperAdminAuthUseCases,
    application::use_cases::tenant_permissions::TenantPermissionUseCases,
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub capability_use_cases: Arc<CapabilityUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub tenant_permission_use_cases: Arc<TenantPermissionUseCases>,
    pub super_admin_auth_use_cases: Arc<SuperAdminAuthUseCases>,
    pub policy_admin_use_cases: Arc<PolicyAdminUseCases>,
    pub audit_use_cases: Arc<AuditUseCases>,
}
