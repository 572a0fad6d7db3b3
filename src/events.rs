//! Append-only audit trail for approval lifecycle transitions.
//!
//! Events are strictly observational: the state machine never reads them,
//! and nothing deduplicates them (repeated `viewed` events are legitimate).
//! Failures to record are logged and swallowed — no triggering operation
//! depends on its event landing.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::event::EventKind;

#[derive(Clone)]
pub struct EventRecorder {
    pool: PgPool,
}

impl EventRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pure append. No read-modify-write, no uniqueness constraint.
    pub async fn record(
        &self,
        approval_id: Uuid,
        event: EventKind,
        by_user_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO approval_events (approval_id, event, by_user_id, metadata)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(approval_id)
        .bind(event)
        .bind(by_user_id)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append and swallow: a failed write is logged, never propagated.
    pub async fn record_logged(
        &self,
        approval_id: Uuid,
        event: EventKind,
        by_user_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = self.record(approval_id, event, by_user_id, metadata).await {
            tracing::warn!(approval_id = %approval_id, event = %event, "failed to record approval event: {}", e);
        } else {
            tracing::debug!(approval_id = %approval_id, event = %event, "approval event recorded");
        }
    }

    /// Fire-and-forget variant for read paths. The insert runs on its own
    /// task so the triggering read cannot be failed or slowed by it.
    pub fn record_detached(
        &self,
        approval_id: Uuid,
        event: EventKind,
        by_user_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) {
        let recorder = self.clone();
        tokio::spawn(async move {
            recorder
                .record_logged(approval_id, event, by_user_id, metadata)
                .await;
        });
    }
}
