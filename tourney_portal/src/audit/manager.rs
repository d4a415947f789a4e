//! Audit log persistence.

use super::models::{AuditAction, AuditEntry, AuditFilter, NewAuditEntry};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder, Row};
use std::sync::Arc;
use thiserror::Error;

/// Audit errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown audit action stored in database: {0}")]
    UnknownAction(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Audit log reader/writer
#[derive(Clone)]
pub struct AuditLog {
    pool: Arc<PgPool>,
}

impl AuditLog {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Write an entry using any executor, typically the caller's open transaction
    pub async fn record<'e, E>(executor: E, entry: &NewAuditEntry) -> AuditResult<i64>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            INSERT INTO audit_entries (tournament_id, admin_id, participant_id, action, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(entry.tournament_id)
        .bind(entry.admin_id)
        .bind(entry.participant_id)
        .bind(entry.action.as_str())
        .bind(&entry.details)
        .fetch_one(executor)
        .await?;

        log::debug!(
            "audit: {} tournament={:?} admin={:?} participant={:?}",
            entry.action,
            entry.tournament_id,
            entry.admin_id,
            entry.participant_id
        );

        Ok(row.get("id"))
    }

    /// List entries matching `filter`, newest first
    pub async fn list(&self, filter: &AuditFilter) -> AuditResult<Vec<AuditEntry>> {
        let rows = build_list_query(filter)
            .build()
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter()
            .map(|row| {
                let action: String = row.get("action");
                Ok(AuditEntry {
                    id: row.get("id"),
                    tournament_id: row.get("tournament_id"),
                    admin_id: row.get("admin_id"),
                    participant_id: row.get("participant_id"),
                    action: action
                        .parse::<AuditAction>()
                        .map_err(AuditError::UnknownAction)?,
                    details: row.get("details"),
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect()
    }
}

/// Build the listing query; every filter value is a bind parameter
pub(crate) fn build_list_query(filter: &AuditFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(
        "SELECT id, tournament_id, admin_id, participant_id, action, details, created_at \
         FROM audit_entries WHERE TRUE",
    );

    if let Some(tournament_id) = filter.tournament_id {
        query.push(" AND tournament_id = ").push_bind(tournament_id);
    }
    if let Some(admin_id) = filter.admin_id {
        query.push(" AND admin_id = ").push_bind(admin_id);
    }
    if let Some(participant_id) = filter.participant_id {
        query.push(" AND participant_id = ").push_bind(participant_id);
    }
    if let Some(action) = filter.action {
        query.push(" AND action = ").push_bind(action.as_str());
    }
    if let Some(since) = filter.since {
        query.push(" AND created_at >= ").push_bind(since.naive_utc());
    }

    query
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.effective_limit())
        .push(" OFFSET ")
        .push_bind(filter.effective_offset());

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_query_only_binds_paging() {
        let query = build_list_query(&AuditFilter::default());
        assert_eq!(
            query.sql(),
            "SELECT id, tournament_id, admin_id, participant_id, action, details, created_at \
             FROM audit_entries WHERE TRUE ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_filters_are_bound_in_order() {
        let filter = AuditFilter {
            tournament_id: Some(4),
            participant_id: Some(10),
            action: Some(AuditAction::ImportApplied),
            ..AuditFilter::default()
        };
        let query = build_list_query(&filter);
        let sql = query.sql();

        assert!(sql.contains("AND tournament_id = $1"));
        assert!(sql.contains("AND participant_id = $2"));
        assert!(sql.contains("AND action = $3"));
        assert!(sql.ends_with("LIMIT $4 OFFSET $5"));
        assert!(!sql.contains("admin_id = "));
    }
}
