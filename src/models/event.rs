use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event names. One per observed lifecycle transition, plus `viewed`
/// for detail reads. Stored as lowercase varchar, append-only.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum EventKind {
    Viewed,
    Approved,
    Rejected,
    Sent,
    Failed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Viewed => "viewed",
            EventKind::Approved => "approved",
            EventKind::Rejected => "rejected",
            EventKind::Sent => "sent",
            EventKind::Failed => "failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
