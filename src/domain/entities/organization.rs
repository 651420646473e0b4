use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Tenant boundary. Owns at most one subscription and N memberships.
#[derive(Debug, Clone)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
