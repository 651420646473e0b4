pub mod audit;
pub mod capabilities;
pub mod platform_permissions;
pub mod policy_admin;
pub mod subscription_lifecycle;
pub mod super_admin_auth;
pub mod tenant_permissions;
