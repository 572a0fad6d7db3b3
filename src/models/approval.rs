use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an approval. Stored as lowercase varchar.
///
/// `pending` is the only state that accepts a caller decision; `sent` and
/// `failed` are reachable only from `approved` when an execution endpoint
/// exists. See [`crate::engine::lifecycle`] for the transition rules.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
    Sent,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Sent => "sent",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of action kinds an approval can gate. Adding a kind is an
/// explicit source change; unknown kinds are rejected at the boundary.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
pub enum ActionKind {
    Order,
    SocialPost,
    EmailReply,
    ForwardedEmail,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Order => "order",
            ActionKind::SocialPost => "social-post",
            ActionKind::EmailReply => "email-reply",
            ActionKind::ForwardedEmail => "forwarded-email",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full approval row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprovalRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub kind: ActionKind,
    pub status: Status,
    pub title: String,
    pub data: serde_json::Value,
    pub execution_endpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
}

impl ApprovalRow {
    /// The list-view summary slice of `data`. Missing previews render as `{}`.
    pub fn preview(&self) -> serde_json::Value {
        self.data
            .get("preview")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

/// Lightweight projection for list views (`data->'preview'` only).
#[derive(Debug, sqlx::FromRow)]
pub struct ApprovalSummaryRow {
    pub id: Uuid,
    pub kind: ActionKind,
    pub status: Status,
    pub title: String,
    pub preview: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_lowercase() {
        let json = serde_json::to_string(&Status::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: Status = serde_json::from_str("\"sent\"").unwrap();
        assert_eq!(back, Status::Sent);
    }

    #[test]
    fn action_kind_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ActionKind::SocialPost).unwrap(),
            "\"social-post\""
        );
        let back: ActionKind = serde_json::from_str("\"email-reply\"").unwrap();
        assert_eq!(back, ActionKind::EmailReply);
    }

    #[test]
    fn unknown_action_kind_is_rejected() {
        let parsed: Result<ActionKind, _> = serde_json::from_str("\"carrier-pigeon\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn preview_falls_back_to_empty_object() {
        let row = ApprovalRow {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            kind: ActionKind::Order,
            status: Status::Pending,
            title: "order #42".into(),
            data: serde_json::json!({"sku": "A-1"}),
            execution_endpoint: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_at: None,
            approved_by: None,
        };
        assert_eq!(row.preview(), serde_json::json!({}));
    }

    #[test]
    fn preview_projects_from_data() {
        let row = ApprovalRow {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            kind: ActionKind::SocialPost,
            status: Status::Pending,
            title: "post".into(),
            data: serde_json::json!({"preview": {"excerpt": "hi"}, "body": "hi there"}),
            execution_endpoint: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_at: None,
            approved_by: None,
        };
        assert_eq!(row.preview(), serde_json::json!({"excerpt": "hi"}));
    }
}
