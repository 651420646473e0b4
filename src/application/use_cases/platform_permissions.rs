use crate::app_error::{AppError, AppResult};
use crate::domain::entities::super_admin::{AdminAction, AdminResource, SuperAdminRole};

/// Platform-plane permission matrix: pure `(role, resource, action)` lookup.
/// Never consults tenant memberships; a super admin acts across every
/// tenant on the strength of the platform role alone.
pub fn has_permission(role: SuperAdminRole, resource: AdminResource, action: AdminAction) -> bool {
    use AdminAction::*;
    use AdminResource::*;

    match role {
        // Full access to everything.
        SuperAdminRole::SuperAdmin => true,

        SuperAdminRole::SupportAdmin => match (resource, action) {
            (Organization, Read | Update) => true,
            (User, Read | Update) => true,
            (Template, Read | Update) => true,
            // Policy reference data: registry, plans, models, prices, overrides.
            (Pricing, Read | Create | Update | Delete) => true,
            (Audit, Read) => true,
            // No admin management, no system-level access.
            _ => false,
        },

        SuperAdminRole::ReadOnlyAdmin => {
            matches!(
                (resource, action),
                (
                    Organization | User | Template | Pricing | Audit,
                    AdminAction::Read
                )
            )
        }
    }
}

pub fn require_permission(
    role: SuperAdminRole,
    resource: AdminResource,
    action: AdminAction,
) -> AppResult<()> {
    if has_permission(role, resource, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Whether audit-log reads show raw IP addresses to this viewer. Everyone
/// else gets the masked form; the raw value is always stored.
pub fn can_see_ip_addresses(role: SuperAdminRole) -> bool {
    role == SuperAdminRole::SuperAdmin
}
