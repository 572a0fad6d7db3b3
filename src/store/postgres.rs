//! Durable relational state for approvals, their assets, and their events.
//!
//! Every read and write is scoped by `org_id`; a row in the wrong tenant is
//! indistinguishable from a missing row.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::approval::{ActionKind, ApprovalRow, ApprovalSummaryRow, Status};
use crate::models::asset::AssetRow;

const APPROVAL_COLUMNS: &str = "id, org_id, kind, status, title, data, execution_endpoint, \
     created_at, updated_at, approved_at, approved_by";

/// Clamp a caller-supplied page size into `[1, 200]`. Defaults live at the
/// API layer; this is the store's hard bound.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 200)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Approval reads --

    /// List a tenant's approvals, newest first, with optional status/kind
    /// filters. Only the summary projection is fetched.
    pub async fn list_approvals(
        &self,
        org_id: Uuid,
        status: Option<Status>,
        kind: Option<ActionKind>,
        limit: i64,
    ) -> Result<Vec<ApprovalSummaryRow>, sqlx::Error> {
        sqlx::query_as::<_, ApprovalSummaryRow>(
            r#"SELECT id, kind, status, title, (data->'preview') AS preview, created_at
               FROM approvals
               WHERE org_id = $1
                 AND ($2::varchar IS NULL OR status = $2)
                 AND ($3::varchar IS NULL OR kind = $3)
               ORDER BY created_at DESC
               LIMIT $4"#,
        )
        .bind(org_id)
        .bind(status.map(|s| s.as_str()))
        .bind(kind.map(|k| k.as_str()))
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_approval(
        &self,
        approval_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<ApprovalRow>, sqlx::Error> {
        sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE id = $1 AND org_id = $2"
        ))
        .bind(approval_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Pending approvals for a tenant, oldest first. Operator/CLI view.
    pub async fn list_pending(&self, org_id: Uuid) -> Result<Vec<ApprovalSummaryRow>, sqlx::Error> {
        sqlx::query_as::<_, ApprovalSummaryRow>(
            r#"SELECT id, kind, status, title, (data->'preview') AS preview, created_at
               FROM approvals
               WHERE org_id = $1 AND status = 'pending'
               ORDER BY created_at ASC"#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    // -- Transition writes (see engine::TransitionEngine for the protocol) --

    /// Exclusively lock one approval row for the lifetime of `tx`.
    /// Blocking: a concurrent decider waits here until the winner commits.
    pub async fn lock_approval(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        approval_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<ApprovalRow>, sqlx::Error> {
        sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE id = $1 AND org_id = $2 FOR UPDATE"
        ))
        .bind(approval_id)
        .bind(org_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// pending → approved, stamping the deciding user. Caller holds the lock.
    pub async fn mark_approved(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        approval_id: Uuid,
        by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE approvals
               SET status = 'approved', approved_by = $2, approved_at = $3, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(approval_id)
        .bind(by)
        .bind(at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// pending → rejected. The decision columns stay NULL — they are stamped
    /// only on the approve path. Caller holds the lock.
    pub async fn mark_rejected(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        approval_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE approvals SET status = 'rejected', updated_at = NOW() WHERE id = $1")
            .bind(approval_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// approved → sent | failed, after dispatch. Runs outside the decision
    /// lock; the status guard keeps a stray retry from clobbering anything
    /// that already moved on.
    pub async fn mark_dispatched(
        &self,
        approval_id: Uuid,
        final_status: Status,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approvals SET status = $2, updated_at = NOW() WHERE id = $1 AND status = 'approved'",
        )
        .bind(approval_id)
        .bind(final_status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- Assets --

    pub async fn list_assets(&self, approval_id: Uuid) -> Result<Vec<AssetRow>, sqlx::Error> {
        sqlx::query_as::<_, AssetRow>(
            r#"SELECT id, approval_id, role, external_url, storage_key,
                      filename, mime_type, size_bytes, created_at
               FROM approval_assets
               WHERE approval_id = $1
               ORDER BY created_at"#,
        )
        .bind(approval_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Fetch one asset, enforcing tenancy through the parent approval.
    pub async fn get_asset(
        &self,
        asset_id: Uuid,
        approval_id: Uuid,
        org_id: Uuid,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        sqlx::query_as::<_, AssetRow>(
            r#"SELECT a.id, a.approval_id, a.role, a.external_url, a.storage_key,
                      a.filename, a.mime_type, a.size_bytes, a.created_at
               FROM approval_assets a
               JOIN approvals ap ON ap.id = a.approval_id
               WHERE a.id = $1 AND a.approval_id = $2 AND ap.org_id = $3"#,
        )
        .bind(asset_id)
        .bind(approval_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_to_bounds() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-5), 1);
        assert_eq!(clamp_limit(1), 1);
        assert_eq!(clamp_limit(50), 50);
        assert_eq!(clamp_limit(200), 200);
        assert_eq!(clamp_limit(1000), 200);
    }
}
