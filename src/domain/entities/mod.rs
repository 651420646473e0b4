pub mod audit;
pub mod entitlement;
pub mod feature_registry;
pub mod membership;
pub mod organization;
pub mod pricing;
pub mod subscription;
pub mod super_admin;
pub mod trial_override;
