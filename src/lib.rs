//! Greenlight — approval lifecycle backend.
//!
//! A multi-tenant service that gates external side-effecting actions
//! (posting content, sending emails, fulfilling orders) behind human
//! review: durable approval state machine, concurrency-safe transitions,
//! webhook dispatch to the tenant's executor, and an append-only audit
//! trail. Authentication, org/user CRUD, and stats live in sibling
//! services; callers arrive with a verified session.

pub mod api;
pub mod assets;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod events;
pub mod identity;
pub mod models;
pub mod store;

use assets::AssetResolver;
use engine::TransitionEngine;
use events::EventRecorder;
use identity::SessionVerifier;
use store::postgres::PgStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub db: PgStore,
    pub engine: TransitionEngine,
    pub assets: AssetResolver,
    pub recorder: EventRecorder,
    pub sessions: SessionVerifier,
    pub config: config::Config,
}

impl AppState {
    /// Wire up every component from a connected store and loaded config.
    pub fn new(db: PgStore, config: config::Config) -> anyhow::Result<Self> {
        let recorder = EventRecorder::new(db.pool().clone());
        let dispatcher = dispatch::WebhookDispatcher::new(
            std::time::Duration::from_secs(config.webhook_timeout_secs),
            config.webhook_signing_secret.clone(),
        );
        let engine = TransitionEngine::new(db.clone(), recorder.clone(), dispatcher);
        let assets = AssetResolver::new(
            db.clone(),
            std::time::Duration::from_secs(config.asset_fetch_timeout_secs),
            config.asset_store_url.as_deref(),
        )?;
        let sessions = SessionVerifier::new(&config.session_secret);

        Ok(Self {
            db,
            engine,
            assets,
            recorder,
            sessions,
            config,
        })
    }
}
