use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A file attached to an approval: source material or a generated draft.
/// Immutable after insert; removed only by cascading approval deletion.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssetRow {
    pub id: Uuid,
    pub approval_id: Uuid,
    pub role: String,
    pub external_url: Option<String>,
    pub storage_key: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Where the asset bytes actually live. Exactly one reference is present
/// per row (schema CHECK); rows violating that surface as `None`.
pub enum AssetRef<'a> {
    ExternalUrl(&'a str),
    StorageKey(&'a str),
}

impl AssetRow {
    pub fn backing(&self) -> Option<AssetRef<'_>> {
        if let Some(url) = self.external_url.as_deref() {
            return Some(AssetRef::ExternalUrl(url));
        }
        self.storage_key.as_deref().map(AssetRef::StorageKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(external_url: Option<&str>, storage_key: Option<&str>) -> AssetRow {
        AssetRow {
            id: Uuid::new_v4(),
            approval_id: Uuid::new_v4(),
            role: "draft_output".into(),
            external_url: external_url.map(String::from),
            storage_key: storage_key.map(String::from),
            filename: None,
            mime_type: None,
            size_bytes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn external_url_wins_when_both_present() {
        let a = asset(Some("https://cdn.example.com/x.png"), Some("drafts/x.png"));
        assert!(matches!(
            a.backing(),
            Some(AssetRef::ExternalUrl("https://cdn.example.com/x.png"))
        ));
    }

    #[test]
    fn storage_key_used_when_no_url() {
        let a = asset(None, Some("drafts/x.png"));
        assert!(matches!(a.backing(), Some(AssetRef::StorageKey("drafts/x.png"))));
    }

    #[test]
    fn no_reference_yields_none() {
        assert!(asset(None, None).backing().is_none());
    }
}
