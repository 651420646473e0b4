use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::audit::{AuditLogFilter, AuditLogPage, AuditLogRepo, NewAuditLog},
    domain::entities::audit::AuditLog,
};

fn row_to_audit_log(row: &PgRow) -> AuditLog {
    AuditLog {
        id: row.get("id"),
        actor_id: row.get("actor_id"),
        actor_role: row.get("actor_role"),
        organization_id: row.get("organization_id"),
        action_type: row.get("action_type"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        old_value: row.get("old_value"),
        new_value: row.get("new_value"),
        source: row.get("source"),
        compliance_relevant: row.get("compliance_relevant"),
        metadata: row.get("metadata"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, actor_id, actor_role, organization_id, action_type, entity_type,
    entity_id, old_value, new_value, source, compliance_relevant, metadata,
    ip_address, created_at
"#;

/// Insert one audit row on any executor, so callers holding a transaction can
/// make the entry commit with their own write.
pub async fn insert_audit_log<'e, E>(executor: E, entry: &NewAuditLog) -> Result<Uuid, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO audit_logs (
            actor_id, actor_role, organization_id, action_type, entity_type,
            entity_id, old_value, new_value, source, compliance_relevant,
            metadata, ip_address
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(entry.actor_id)
    .bind(&entry.actor_role)
    .bind(entry.organization_id)
    .bind(entry.action_type)
    .bind(entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.old_value)
    .bind(&entry.new_value)
    .bind(entry.source)
    .bind(entry.compliance_relevant)
    .bind(&entry.metadata)
    .bind(&entry.ip_address)
    .fetch_one(executor)
    .await?;
    Ok(row.get("id"))
}

#[async_trait]
impl AuditLogRepo for PostgresPersistence {
    async fn insert(&self, entry: &NewAuditLog) -> AppResult<Uuid> {
        insert_audit_log(&self.pool, entry)
            .await
            .map_err(AppError::from)
    }

    async fn query(&self, filter: &AuditLogFilter) -> AppResult<AuditLogPage> {
        // Filters share one WHERE clause between the count and page queries.
        let mut conditions = Vec::new();
        let mut idx = 0usize;
        let mut next = || {
            idx += 1;
            idx
        };
        if filter.organization_id.is_some() {
            conditions.push(format!("organization_id = ${}", next()));
        }
        if filter.actor_id.is_some() {
            conditions.push(format!("actor_id = ${}", next()));
        }
        if filter.entity_type.is_some() {
            conditions.push(format!("entity_type = ${}", next()));
        }
        if filter.entity_id.is_some() {
            conditions.push(format!("entity_id = ${}", next()));
        }
        if filter.action_type.is_some() {
            conditions.push(format!("action_type = ${}", next()));
        }
        if filter.date_from.is_some() {
            conditions.push(format!("created_at >= ${}", next()));
        }
        if filter.date_to.is_some() {
            conditions.push(format!("created_at <= ${}", next()));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        macro_rules! bind_filters {
            ($query:expr) => {{
                let mut q = $query;
                if let Some(v) = filter.organization_id {
                    q = q.bind(v);
                }
                if let Some(v) = filter.actor_id {
                    q = q.bind(v);
                }
                if let Some(v) = filter.entity_type {
                    q = q.bind(v);
                }
                if let Some(v) = &filter.entity_id {
                    q = q.bind(v);
                }
                if let Some(v) = filter.action_type {
                    q = q.bind(v);
                }
                if let Some(v) = filter.date_from {
                    q = q.bind(v);
                }
                if let Some(v) = filter.date_to {
                    q = q.bind(v);
                }
                q
            }};
        }

        let count_sql = format!("SELECT COUNT(*) AS total FROM audit_logs {}", where_clause);
        let total: i64 = bind_filters!(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?
            .get("total");

        let page = filter.page();
        let per_page = filter.per_page();
        let offset = (page - 1) * per_page;
        let page_sql = format!(
            "SELECT {} FROM audit_logs {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            SELECT_COLS, where_clause, per_page, offset
        );
        let rows = bind_filters!(sqlx::query(&page_sql))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        let total_pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Ok(AuditLogPage {
            entries: rows.iter().map(row_to_audit_log).collect(),
            total,
            page,
            per_page,
            total_pages,
        })
    }
}
