//! Transition engine: the only writer of approval status.
//!
//! Approve/reject flow:
//! 1. Open a transaction and `SELECT ... FOR UPDATE` the target row, scoped
//!    by `(id, org_id)`. Concurrent deciders on the same id queue here;
//!    exactly one observes `pending`.
//! 2. Arbitrate the decision against the locked status (see [`lifecycle`]).
//! 3. Persist the decision and commit. The human decision is now durable —
//!    a crash after this point can never resurrect `pending`.
//! 4. Record the audit event (best-effort).
//! 5. Approve only: if an execution endpoint is configured, dispatch and
//!    persist the outcome (`sent`/`failed`) plus its event. A crash between
//!    steps 3 and 5 leaves the row at `approved`; re-running the dispatch is
//!    an operator action, not automatic.

pub mod lifecycle;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::dispatch::{execution_payload, WebhookDispatcher};
use crate::errors::AppError;
use crate::events::EventRecorder;
use crate::models::approval::{ApprovalRow, Status};
use crate::store::postgres::PgStore;
use lifecycle::{arbitrate, conclude, Decided, Decision};

/// What a decision call resolved to: the approval and its resulting status.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub approval_id: Uuid,
    pub status: Status,
}

#[derive(Clone)]
pub struct TransitionEngine {
    db: PgStore,
    recorder: EventRecorder,
    dispatcher: WebhookDispatcher,
}

impl TransitionEngine {
    pub fn new(db: PgStore, recorder: EventRecorder, dispatcher: WebhookDispatcher) -> Self {
        Self {
            db,
            recorder,
            dispatcher,
        }
    }

    /// Approve a pending approval and, if it carries an execution endpoint,
    /// dispatch it. The returned status is the terminal one: `approved` when
    /// there is nothing to dispatch, otherwise `sent` or `failed`.
    ///
    /// Dispatch failure is not an error here — the caller's decision
    /// succeeded; the machine outcome rides in the status field.
    pub async fn approve(
        &self,
        approval_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<DecisionOutcome, AppError> {
        let decision = Decision::Approve {
            by: user_id,
            at: Utc::now(),
        };
        let (approval, decided) = self.decide(approval_id, org_id, decision).await?;
        self.recorder
            .record_logged(approval_id, decided.event(), Some(user_id), decided.metadata())
            .await;

        let Some(endpoint) = approval.execution_endpoint.as_deref() else {
            // No executor configured: the approval terminates here.
            return Ok(DecisionOutcome {
                approval_id,
                status: Status::Approved,
            });
        };

        tracing::info!(approval_id = %approval_id, endpoint, "dispatching approved action");
        let payload = execution_payload(&approval, user_id);
        let outcome = self.dispatcher.execute(endpoint, &payload).await;

        // The locked transaction left the row at `approved`.
        let final_status = match conclude(Status::Approved, &outcome) {
            Ok(s) => s,
            Err(current) => return Err(AppError::InvalidState { current }),
        };
        let updated = self.db.mark_dispatched(approval_id, final_status).await?;
        if !updated {
            tracing::warn!(
                approval_id = %approval_id,
                "dispatch outcome not persisted: row is no longer 'approved'"
            );
        }
        self.recorder
            .record_logged(approval_id, outcome.event(), Some(user_id), outcome.metadata())
            .await;

        Ok(DecisionOutcome {
            approval_id,
            status: final_status,
        })
    }

    /// Reject a pending approval. Nothing is dispatched; the reason, if any,
    /// lands in the audit event's metadata.
    pub async fn reject(
        &self,
        approval_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        reason: Option<String>,
    ) -> Result<DecisionOutcome, AppError> {
        let decision = Decision::Reject {
            by: user_id,
            reason,
        };
        let (_, decided) = self.decide(approval_id, org_id, decision).await?;
        self.recorder
            .record_logged(approval_id, decided.event(), Some(user_id), decided.metadata())
            .await;

        Ok(DecisionOutcome {
            approval_id,
            status: Status::Rejected,
        })
    }

    /// The locked section: lock the row, arbitrate, persist, commit.
    ///
    /// The exclusive row lock is held from the `SELECT ... FOR UPDATE` until
    /// commit, so at most one decision ever leaves `pending`, regardless of
    /// how many deciders race — in this process or any other.
    async fn decide(
        &self,
        approval_id: Uuid,
        org_id: Uuid,
        decision: Decision,
    ) -> Result<(ApprovalRow, Decided), AppError> {
        let mut tx = self.db.pool().begin().await?;

        let Some(approval) = self.db.lock_approval(&mut tx, approval_id, org_id).await? else {
            // Wrong id and wrong tenant are indistinguishable by design.
            return Err(AppError::NotFound);
        };

        let decided = arbitrate(approval.status, decision)
            .map_err(|current| AppError::InvalidState { current })?;

        match &decided {
            Decided::Approved { by, at } => {
                self.db.mark_approved(&mut tx, approval_id, *by, *at).await?;
            }
            Decided::Rejected { .. } => {
                self.db.mark_rejected(&mut tx, approval_id).await?;
            }
        }

        tx.commit().await?;
        tracing::info!(
            approval_id = %approval_id,
            status = %decided.status(),
            "approval decision committed"
        );

        Ok((approval, decided))
    }
}
