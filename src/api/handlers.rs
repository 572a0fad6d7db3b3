use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::identity::Identity;
use crate::models::approval::{ActionKind, ApprovalRow, Status};
use crate::models::asset::AssetRow;
use crate::models::event::EventKind;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<Status>,
    #[serde(rename = "type")]
    pub kind: Option<ActionKind>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ApprovalListItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub status: Status,
    pub title: String,
    pub preview: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Asset as rendered in a detail view: a stable proxy reference, never the
/// backing URL.
#[derive(Serialize)]
pub struct AssetView {
    pub id: Uuid,
    pub role: String,
    pub href: String,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl AssetView {
    fn from_row(asset: AssetRow) -> Self {
        let href = format!("/approvals/{}/assets/{}", asset.approval_id, asset.id);
        Self {
            id: asset.id,
            role: asset.role,
            href,
            filename: asset.filename,
            mime_type: asset.mime_type,
            size_bytes: asset.size_bytes,
        }
    }
}

#[derive(Serialize)]
pub struct ApprovalDetail {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub status: Status,
    pub title: String,
    pub preview: serde_json::Value,
    pub data: serde_json::Value,
    pub assets: Vec<AssetView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub execution_endpoint: Option<String>,
}

impl ApprovalDetail {
    fn from_row(approval: ApprovalRow, assets: Vec<AssetRow>) -> Self {
        let preview = approval.preview();
        Self {
            id: approval.id,
            kind: approval.kind,
            status: approval.status,
            title: approval.title,
            preview,
            data: approval.data,
            assets: assets.into_iter().map(AssetView::from_row).collect(),
            created_at: approval.created_at,
            updated_at: approval.updated_at,
            approved_at: approval.approved_at,
            approved_by: approval.approved_by,
            execution_endpoint: approval.execution_endpoint,
        }
    }
}

#[derive(Serialize)]
pub struct DecisionResponse {
    pub approval_id: Uuid,
    pub status: Status,
}

#[derive(Deserialize, Default)]
pub struct RejectBody {
    pub reason: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /approvals — list the caller's organization's approvals.
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApprovalListItem>>, AppError> {
    let rows = state
        .db
        .list_approvals(
            identity.org_id,
            params.status,
            params.kind,
            params.limit.unwrap_or(50),
        )
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| ApprovalListItem {
                id: row.id,
                kind: row.kind,
                status: row.status,
                title: row.title,
                preview: row.preview.unwrap_or_else(|| serde_json::json!({})),
                created_at: row.created_at,
            })
            .collect(),
    ))
}

/// GET /approvals/:id — full approval with assets and payload.
/// Records a `viewed` event off the request path.
pub async fn get_approval_detail(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(approval_id): Path<Uuid>,
) -> Result<Json<ApprovalDetail>, AppError> {
    let approval = state
        .db
        .get_approval(approval_id, identity.org_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let assets = state.db.list_assets(approval_id).await?;

    state.recorder.record_detached(
        approval_id,
        EventKind::Viewed,
        Some(identity.user_id),
        serde_json::json!({}),
    );

    Ok(Json(ApprovalDetail::from_row(approval, assets)))
}

/// POST /approvals/:id/approve — approve and dispatch.
pub async fn approve_approval(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(approval_id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, AppError> {
    let engine = state.engine.clone();
    // Once the row lock is taken the decision must land; running the
    // transition on its own task keeps a dropped connection from
    // cancelling it halfway.
    let outcome = tokio::spawn(async move {
        engine
            .approve(approval_id, identity.org_id, identity.user_id)
            .await
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("approve task failed: {}", e)))??;

    Ok(Json(DecisionResponse {
        approval_id: outcome.approval_id,
        status: outcome.status,
    }))
}

/// POST /approvals/:id/reject — reject with an optional reason.
pub async fn reject_approval(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(approval_id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Result<Json<DecisionResponse>, AppError> {
    let reason = body.and_then(|Json(b)| b.reason);

    let engine = state.engine.clone();
    let outcome = tokio::spawn(async move {
        engine
            .reject(approval_id, identity.org_id, identity.user_id, reason)
            .await
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("reject task failed: {}", e)))??;

    Ok(Json(DecisionResponse {
        approval_id: outcome.approval_id,
        status: outcome.status,
    }))
}

/// GET /approvals/:id/assets/:asset_id — proxied asset bytes.
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path((approval_id, asset_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let resolved = state
        .assets
        .resolve(approval_id, asset_id, identity.org_id)
        .await?;

    let mut response = resolved.bytes.into_response();
    let headers = response.headers_mut();

    if let Ok(mime) = HeaderValue::from_str(&resolved.mime_type) {
        headers.insert(header::CONTENT_TYPE, mime);
    }
    if let Some(filename) = resolved.filename {
        let disposition = format!("inline; filename=\"{}\"", filename.replace('"', ""));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}
