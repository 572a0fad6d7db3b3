//! Proxied asset retrieval.
//!
//! Detail views never hand out raw backing URLs — those may be presigned,
//! credentialed, or short-lived. Every asset is addressed through the stable
//! proxy path `/approvals/{id}/assets/{asset_id}`, and this resolver fetches
//! the bytes from wherever they actually live. To the caller, a missing
//! asset, a foreign tenant, and a broken upstream all look the same:
//! asset unavailable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use object_store::{path::Path, ObjectStore};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::asset::{AssetRef, AssetRow};
use crate::store::postgres::PgStore;

const FALLBACK_MIME: &str = "application/octet-stream";

/// The resolved bytes plus the metadata the transport layer needs.
pub struct ResolvedAsset {
    pub bytes: Bytes,
    pub mime_type: String,
    pub filename: Option<String>,
}

#[derive(Clone)]
pub struct AssetResolver {
    db: PgStore,
    http: reqwest::Client,
    fetch_timeout: Duration,
    object: Option<Arc<dyn ObjectStore>>,
}

impl AssetResolver {
    pub fn new(db: PgStore, fetch_timeout: Duration, store_url: Option<&str>) -> Result<Self> {
        let object = match store_url {
            Some(url) => {
                let store = build_object_store(url)?;
                tracing::info!(url = %url, "asset resolver: object store backend configured");
                Some(Arc::from(store))
            }
            None => None,
        };

        Ok(Self {
            db,
            http: reqwest::Client::builder()
                .user_agent("Greenlight-Assets/1.0")
                .build()
                .context("failed to build asset HTTP client")?,
            fetch_timeout,
            object,
        })
    }

    /// Fetch an asset's bytes for a tenant caller.
    pub async fn resolve(
        &self,
        approval_id: Uuid,
        asset_id: Uuid,
        org_id: Uuid,
    ) -> Result<ResolvedAsset, AppError> {
        let asset = self
            .db
            .get_asset(asset_id, approval_id, org_id)
            .await?
            .ok_or(AppError::AssetUnavailable)?;

        let bytes = match asset.backing() {
            Some(AssetRef::ExternalUrl(url)) => self.fetch_external(&asset, url).await?,
            Some(AssetRef::StorageKey(key)) => self.fetch_stored(&asset, key).await?,
            None => {
                tracing::warn!(asset_id = %asset.id, "asset row has no backing reference");
                return Err(AppError::AssetUnavailable);
            }
        };

        Ok(ResolvedAsset {
            mime_type: asset
                .mime_type
                .clone()
                .unwrap_or_else(|| FALLBACK_MIME.to_string()),
            filename: asset.filename.clone(),
            bytes,
        })
    }

    async fn fetch_external(&self, asset: &AssetRow, url: &str) -> Result<Bytes, AppError> {
        let resp = self
            .http
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(asset_id = %asset.id, error = %e, "asset fetch failed");
                AppError::AssetUnavailable
            })?;

        if !resp.status().is_success() {
            tracing::warn!(asset_id = %asset.id, status = %resp.status(), "asset upstream returned non-success");
            return Err(AppError::AssetUnavailable);
        }

        resp.bytes().await.map_err(|e| {
            tracing::warn!(asset_id = %asset.id, error = %e, "asset body read failed");
            AppError::AssetUnavailable
        })
    }

    async fn fetch_stored(&self, asset: &AssetRow, key: &str) -> Result<Bytes, AppError> {
        let Some(store) = self.object.as_ref() else {
            tracing::warn!(asset_id = %asset.id, "storage-key asset but no object store configured");
            return Err(AppError::AssetUnavailable);
        };

        let path = Path::from(key);
        let fetched = match store.get(&path).await {
            Ok(result) => result.bytes().await,
            Err(e) => Err(e),
        };

        fetched.map_err(|e| {
            tracing::warn!(asset_id = %asset.id, key, error = %e, "object store fetch failed");
            AppError::AssetUnavailable
        })
    }
}

/// Parse a `GREENLIGHT_ASSET_STORE_URL` into an `ObjectStore` impl.
fn build_object_store(url: &str) -> Result<Box<dyn ObjectStore>> {
    if url.starts_with("file://") {
        // Local filesystem — great for development/testing
        let path = url.trim_start_matches("file://");
        let store = object_store::local::LocalFileSystem::new_with_prefix(path)
            .context("failed to create local file system object store")?;
        return Ok(Box::new(store));
    }

    if url.starts_with("s3://") {
        let without_scheme = url.trim_start_matches("s3://");
        let bucket = without_scheme.split('?').next().unwrap_or(without_scheme);

        // Check for custom endpoint (MinIO)
        let endpoint = parse_query_param(url, "endpoint");
        let region = parse_query_param(url, "region").unwrap_or_else(|| "us-east-1".to_string());

        let mut builder = object_store::aws::AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&region);

        if let Some(ep) = endpoint {
            builder = builder.with_endpoint(&ep).with_allow_http(true);
        }

        // Credentials from env: AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY
        // (or instance metadata / IAM role in production)
        if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
            if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
                builder = builder.with_access_key_id(key).with_secret_access_key(secret);
            }
        }

        let store = builder.build().context("failed to build S3 object store")?;
        return Ok(Box::new(store));
    }

    anyhow::bail!("unsupported GREENLIGHT_ASSET_STORE_URL scheme: {}", url)
}

fn parse_query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split('?').nth(1)?;
    for part in query.split('&') {
        let mut kv = part.splitn(2, '=');
        if kv.next() == Some(key) {
            return kv.next().map(|v| urlencoding::decode(v).unwrap_or_default().into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_param_extracts_values() {
        let url = "s3://bucket?endpoint=http%3A%2F%2Fminio%3A9000&region=eu-west-1";
        assert_eq!(
            parse_query_param(url, "endpoint").as_deref(),
            Some("http://minio:9000")
        );
        assert_eq!(parse_query_param(url, "region").as_deref(), Some("eu-west-1"));
        assert_eq!(parse_query_param(url, "missing"), None);
    }

    #[test]
    fn unsupported_store_scheme_is_an_error() {
        assert!(build_object_store("ftp://nope").is_err());
    }
}
