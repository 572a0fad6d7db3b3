use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use greenlight::cli::{ApprovalCommands, Cli, Commands};
use greenlight::store::postgres::PgStore;
use greenlight::{api, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "greenlight=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Migrate) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
        Some(Commands::Approval { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let state = AppState::new(db, cfg)?;
            handle_approval_command(command, &state).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let dashboard_origin = cfg.dashboard_origin.clone();
    let state = Arc::new(AppState::new(db, cfg)?);

    let app = axum::Router::new()
        // Health endpoints (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        .merge(api::api_router())
        .with_state(state.clone())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                ])
                .allow_credentials(true)
        })
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("greenlight listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Readiness: the process is up AND the database answers.
async fn readiness_check(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(state.db.pool())
        .await
        .map_err(|e| {
            tracing::warn!("readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok("ok")
}

async fn handle_approval_command(
    cmd: ApprovalCommands,
    state: &AppState,
) -> anyhow::Result<()> {
    match cmd {
        ApprovalCommands::List { org_id } => {
            let org = Uuid::parse_str(&org_id).context("Invalid org_id")?;
            let pending = state.db.list_pending(org).await?;
            if pending.is_empty() {
                println!("No pending approvals.");
            } else {
                println!("{:<38} {:<16} {:<40}", "ID", "TYPE", "TITLE");
                for a in pending {
                    println!("{:<38} {:<16} {:<40}", a.id, a.kind.as_str(), a.title);
                }
            }
        }
        ApprovalCommands::Approve {
            approval_id,
            org_id,
            user_id,
        } => {
            let id = Uuid::parse_str(&approval_id).context("Invalid approval_id")?;
            let org = Uuid::parse_str(&org_id).context("Invalid org_id")?;
            let user = Uuid::parse_str(&user_id).context("Invalid user_id")?;
            let outcome = state.engine.approve(id, org, user).await?;
            println!("Approval {} -> {}", outcome.approval_id, outcome.status);
        }
        ApprovalCommands::Reject {
            approval_id,
            org_id,
            user_id,
            reason,
        } => {
            let id = Uuid::parse_str(&approval_id).context("Invalid approval_id")?;
            let org = Uuid::parse_str(&org_id).context("Invalid org_id")?;
            let user = Uuid::parse_str(&user_id).context("Invalid user_id")?;
            let outcome = state.engine.reject(id, org, user, reason).await?;
            println!("Approval {} -> {}", outcome.approval_id, outcome.status);
        }
    }
    Ok(())
}
