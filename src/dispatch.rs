//! Webhook dispatch: handing an approved action to the tenant's executor.
//!
//! The dispatcher makes exactly one attempt per approval, bounded by a fixed
//! timeout, and never lets a transport failure escape its boundary — every
//! failure mode folds into [`DispatchOutcome::Failed`] with a reason string.
//! Retry policy, if any, belongs to the operator, not this module.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::approval::ApprovalRow;
use crate::models::event::EventKind;

/// Result of one execution attempt against a tenant endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The endpoint answered in the 200–299 range.
    Sent { status: u16 },
    /// Anything else: non-2xx status, timeout, or connection error.
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn event(&self) -> EventKind {
        match self {
            DispatchOutcome::Sent { .. } => EventKind::Sent,
            DispatchOutcome::Failed { .. } => EventKind::Failed,
        }
    }

    /// Event metadata for the audit trail: the upstream status on success,
    /// the failure reason otherwise.
    pub fn metadata(&self) -> Value {
        match self {
            DispatchOutcome::Sent { status } => {
                serde_json::json!({ "webhook_status": status })
            }
            DispatchOutcome::Failed { reason } => serde_json::json!({ "error": reason }),
        }
    }
}

/// Build the payload POSTed to the execution endpoint: the approval's `data`
/// with correlation fields layered on top. Injected keys silently override
/// same-named keys in `data` — existing integrations depend on this
/// precedence, do not flip it.
pub fn execution_payload(approval: &ApprovalRow, acting_user: Uuid) -> Value {
    let mut payload = match &approval.data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    payload.insert("approval_id".into(), Value::String(approval.id.to_string()));
    payload.insert("type".into(), Value::String(approval.kind.to_string()));
    payload.insert("title".into(), Value::String(approval.title.clone()));
    payload.insert("org_id".into(), Value::String(approval.org_id.to_string()));
    payload.insert("user_id".into(), Value::String(acting_user.to_string()));
    Value::Object(payload)
}

/// Compute HMAC-SHA256 of `payload` using `secret`.
/// Returns "sha256=<lowercase hex digest>".
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(bytes))
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    timeout: Duration,
    signing_secret: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(timeout: Duration, signing_secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Greenlight-Dispatch/1.0")
                .build()
                .expect("failed to build dispatch HTTP client"),
            timeout,
            signing_secret,
        }
    }

    /// Invoke the tenant's execution endpoint with the given payload.
    ///
    /// One attempt, fixed timeout, no retries. The endpoint URL is untrusted
    /// tenant configuration; nothing in the response is parsed beyond the
    /// status code.
    pub async fn execute(&self, endpoint: &str, payload: &Value) -> DispatchOutcome {
        let body = match serde_json::to_vec(payload) {
            Ok(b) => b,
            Err(e) => {
                return DispatchOutcome::Failed {
                    reason: format!("payload serialize error: {}", e),
                }
            }
        };

        let delivery_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut req = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .header("x-greenlight-delivery-id", &delivery_id)
            .header("x-greenlight-timestamp", &timestamp);

        if let Some(secret) = self.signing_secret.as_deref() {
            req = req.header("x-greenlight-signature", hmac_sha256_hex(secret, &body));
        }

        match req.body(body).send().await {
            Ok(resp) if resp.status().is_success() => {
                let status = resp.status().as_u16();
                info!(
                    endpoint,
                    delivery_id = %delivery_id,
                    status,
                    "execution webhook delivered"
                );
                DispatchOutcome::Sent { status }
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                warn!(
                    endpoint,
                    delivery_id = %delivery_id,
                    status,
                    "execution webhook returned non-success status"
                );
                DispatchOutcome::Failed {
                    reason: format!("endpoint returned status {}", status),
                }
            }
            Err(e) if e.is_timeout() => {
                warn!(endpoint, delivery_id = %delivery_id, "execution webhook timed out");
                DispatchOutcome::Failed {
                    reason: format!("timed out after {}s", self.timeout.as_secs()),
                }
            }
            Err(e) => {
                warn!(endpoint, delivery_id = %delivery_id, error = %e, "execution webhook request error");
                DispatchOutcome::Failed {
                    reason: format!("request error: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::{ActionKind, Status};
    use chrono::Utc;

    fn approval(data: Value) -> ApprovalRow {
        ApprovalRow {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            kind: ActionKind::SocialPost,
            status: Status::Pending,
            title: "launch post".into(),
            data,
            execution_endpoint: Some("https://executor.example.com/run".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_at: None,
            approved_by: None,
        }
    }

    #[test]
    fn payload_merges_data_with_correlation_fields() {
        let row = approval(serde_json::json!({
            "preview": {"excerpt": "hi"},
            "body": "hi there"
        }));
        let user = Uuid::new_v4();
        let payload = execution_payload(&row, user);

        assert_eq!(payload["body"], "hi there");
        assert_eq!(payload["preview"]["excerpt"], "hi");
        assert_eq!(payload["approval_id"], row.id.to_string());
        assert_eq!(payload["type"], "social-post");
        assert_eq!(payload["title"], "launch post");
        assert_eq!(payload["org_id"], row.org_id.to_string());
        assert_eq!(payload["user_id"], user.to_string());
    }

    #[test]
    fn injected_fields_override_same_named_data_keys() {
        let row = approval(serde_json::json!({
            "title": "spoofed title",
            "org_id": "spoofed org",
            "user_id": "spoofed user"
        }));
        let user = Uuid::new_v4();
        let payload = execution_payload(&row, user);

        assert_eq!(payload["title"], "launch post");
        assert_eq!(payload["org_id"], row.org_id.to_string());
        assert_eq!(payload["user_id"], user.to_string());
    }

    #[test]
    fn non_object_data_still_yields_correlation_fields() {
        let row = approval(Value::Null);
        let payload = execution_payload(&row, Uuid::new_v4());
        assert_eq!(payload["approval_id"], row.id.to_string());
        assert!(payload.get("body").is_none());
    }

    #[test]
    fn outcome_event_mapping() {
        assert_eq!(DispatchOutcome::Sent { status: 200 }.event(), EventKind::Sent);
        assert_eq!(
            DispatchOutcome::Failed {
                reason: "x".into()
            }
            .event(),
            EventKind::Failed
        );
    }

    #[test]
    fn outcome_metadata_carries_status_or_reason() {
        assert_eq!(
            DispatchOutcome::Sent { status: 204 }.metadata(),
            serde_json::json!({"webhook_status": 204})
        );
        assert_eq!(
            DispatchOutcome::Failed {
                reason: "endpoint returned status 500".into()
            }
            .metadata(),
            serde_json::json!({"error": "endpoint returned status 500"})
        );
    }

    #[test]
    fn hmac_signature_deterministic() {
        let sig1 = hmac_sha256_hex("secret123", b"payload");
        let sig2 = hmac_sha256_hex("secret123", b"payload");
        assert_eq!(sig1, sig2);
        assert!(sig1.starts_with("sha256="));
    }

    #[test]
    fn hmac_signature_depends_on_secret() {
        assert_ne!(
            hmac_sha256_hex("secret1", b"payload"),
            hmac_sha256_hex("secret2", b"payload")
        );
    }
}
