//! The approval state machine, in one place.
//!
//! `pending → approved | rejected` is arbitrated by [`arbitrate`];
//! `approved → sent | failed` is folded by [`conclude`] after dispatch.
//! A [`Decided`] value can only be produced by `arbitrate`, so a terminal
//! decision write always went through the guard — invalid transitions are
//! unrepresentable at the persistence call sites.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dispatch::DispatchOutcome;
use crate::models::approval::Status;
use crate::models::event::EventKind;

/// A caller's verdict on a pending approval.
#[derive(Debug, Clone)]
pub enum Decision {
    Approve { by: Uuid, at: DateTime<Utc> },
    Reject { by: Uuid, reason: Option<String> },
}

/// The state a decision moves an approval into, tagged with what the
/// transition must persist.
#[derive(Debug, Clone, PartialEq)]
pub enum Decided {
    Approved { by: Uuid, at: DateTime<Utc> },
    Rejected { by: Uuid, reason: Option<String> },
}

impl Decided {
    pub fn status(&self) -> Status {
        match self {
            Decided::Approved { .. } => Status::Approved,
            Decided::Rejected { .. } => Status::Rejected,
        }
    }

    pub fn event(&self) -> EventKind {
        match self {
            Decided::Approved { .. } => EventKind::Approved,
            Decided::Rejected { .. } => EventKind::Rejected,
        }
    }

    /// Event metadata for the audit trail. A rejection carries its reason.
    pub fn metadata(&self) -> serde_json::Value {
        match self {
            Decided::Approved { .. } => serde_json::json!({}),
            Decided::Rejected { reason: Some(r), .. } => serde_json::json!({ "reason": r }),
            Decided::Rejected { reason: None, .. } => serde_json::json!({}),
        }
    }
}

/// Arbitrate a decision against the current status.
///
/// Only `pending` permits a decision; every other state reports itself so
/// the caller can surface the conflict. Exhaustive on purpose — adding a
/// status forces this function to say what it means for arbitration.
pub fn arbitrate(current: Status, decision: Decision) -> Result<Decided, Status> {
    match current {
        Status::Pending => Ok(match decision {
            Decision::Approve { by, at } => Decided::Approved { by, at },
            Decision::Reject { by, reason } => Decided::Rejected { by, reason },
        }),
        Status::Approved | Status::Rejected | Status::Sent | Status::Failed => Err(current),
    }
}

/// Fold a dispatch outcome into the final status.
///
/// Only a row still sitting at `approved` may be concluded; everything else
/// reports itself. (The store's conditional UPDATE enforces the same guard
/// at the row level.)
pub fn conclude(current: Status, outcome: &DispatchOutcome) -> Result<Status, Status> {
    match current {
        Status::Approved => Ok(match outcome {
            DispatchOutcome::Sent { .. } => Status::Sent,
            DispatchOutcome::Failed { .. } => Status::Failed,
        }),
        Status::Pending | Status::Rejected | Status::Sent | Status::Failed => Err(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approve() -> Decision {
        Decision::Approve {
            by: Uuid::new_v4(),
            at: Utc::now(),
        }
    }

    fn reject(reason: Option<&str>) -> Decision {
        Decision::Reject {
            by: Uuid::new_v4(),
            reason: reason.map(String::from),
        }
    }

    const NON_PENDING: [Status; 4] = [
        Status::Approved,
        Status::Rejected,
        Status::Sent,
        Status::Failed,
    ];

    #[test]
    fn pending_accepts_approve() {
        let by = Uuid::new_v4();
        let at = Utc::now();
        let decided = arbitrate(Status::Pending, Decision::Approve { by, at }).unwrap();
        assert_eq!(decided, Decided::Approved { by, at });
        assert_eq!(decided.status(), Status::Approved);
        assert_eq!(decided.event(), EventKind::Approved);
    }

    #[test]
    fn pending_accepts_reject_with_reason() {
        let decided = arbitrate(Status::Pending, reject(Some("duplicate"))).unwrap();
        assert_eq!(decided.status(), Status::Rejected);
        assert_eq!(decided.event(), EventKind::Rejected);
        assert_eq!(decided.metadata(), serde_json::json!({"reason": "duplicate"}));
    }

    #[test]
    fn reject_without_reason_has_empty_metadata() {
        let decided = arbitrate(Status::Pending, reject(None)).unwrap();
        assert_eq!(decided.metadata(), serde_json::json!({}));
    }

    #[test]
    fn every_non_pending_state_rejects_decisions() {
        for current in NON_PENDING {
            assert_eq!(arbitrate(current, approve()), Err(current));
            assert_eq!(arbitrate(current, reject(Some("late"))), Err(current));
        }
    }

    #[test]
    fn conclude_only_from_approved() {
        let sent = DispatchOutcome::Sent { status: 200 };
        let failed = DispatchOutcome::Failed {
            reason: "timed out after 30s".into(),
        };

        assert_eq!(conclude(Status::Approved, &sent), Ok(Status::Sent));
        assert_eq!(conclude(Status::Approved, &failed), Ok(Status::Failed));

        for current in [Status::Pending, Status::Rejected, Status::Sent, Status::Failed] {
            assert_eq!(conclude(current, &sent), Err(current));
            assert_eq!(conclude(current, &failed), Err(current));
        }
    }
}
