use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Shared HS256 secret for verifying session tokens minted by the auth
    /// service. This backend only verifies — it never issues sessions.
    pub session_secret: String,
    /// Hard ceiling on a single execution-webhook call, in seconds.
    /// Set via GREENLIGHT_WEBHOOK_TIMEOUT_SECS. Default: 30.
    pub webhook_timeout_secs: u64,
    /// Optional HMAC-SHA256 secret for signing dispatched payloads.
    pub webhook_signing_secret: Option<String>,
    /// Object store URL for assets referenced by storage key
    /// (s3://bucket?..., file:///path). Unset → external-URL assets only.
    pub asset_store_url: Option<String>,
    /// Timeout for proxied asset fetches, in seconds. Default: 15.
    pub asset_fetch_timeout_secs: u64,
    /// Allowed CORS origin for the dashboard frontend.
    pub dashboard_origin: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let session_secret = std::env::var("GREENLIGHT_SESSION_SECRET")
        .unwrap_or_else(|_| "CHANGE_ME_SESSION_SECRET".into());

    if session_secret == "CHANGE_ME_SESSION_SECRET" {
        let env_mode = std::env::var("GREENLIGHT_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "GREENLIGHT_SESSION_SECRET is still the insecure placeholder. \
                 Set the secret shared with the auth service before running in production."
            );
        }
        eprintln!("⚠️  GREENLIGHT_SESSION_SECRET is not set — using insecure placeholder. Sessions from the real auth service will not verify.");
    }

    Ok(Config {
        port: std::env::var("GREENLIGHT_PORT")
            .unwrap_or_else(|_| "8088".into())
            .parse()
            .unwrap_or(8088),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/greenlight".into()),
        session_secret,
        webhook_timeout_secs: std::env::var("GREENLIGHT_WEBHOOK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        webhook_signing_secret: std::env::var("GREENLIGHT_WEBHOOK_SIGNING_SECRET").ok(),
        asset_store_url: std::env::var("GREENLIGHT_ASSET_STORE_URL")
            .ok()
            .filter(|s| !s.is_empty()),
        asset_fetch_timeout_secs: std::env::var("GREENLIGHT_ASSET_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15),
        dashboard_origin: std::env::var("DASHBOARD_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string()),
    })
}
