//! stagepass server
//!
//! Demo wiring of the authorization engine: one route table drives both the
//! axum router and the route registry, so the startup coverage check can
//! hold them to the same surface. Handlers are stubs; the engine in front
//! of them is the real thing.

use axum::Json;
use axum::http::{Method, StatusCode};
use axum::routing::{MethodFilter, on};
use clap::Parser;
use stagepass::access_control::{
    AccessEngine, RoleLevel, RoleResolver, RouteRegistry, access_middleware,
};
use stagepass::auth::TokenCodec;
use stagepass::config::load_config;
use stagepass::store::MemoryStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// stagepass - request authorization for the collaborative editing backend
#[derive(Parser, Debug)]
#[command(name = "stagepass")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "STAGEPASS_CONFIG")]
    config: Option<String>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, env = "STAGEPASS_LOG_LEVEL")]
    log_level: Option<String>,
}

/// The route surface of the collaborative editing backend.
///
/// One entry per (pattern, method): required role and the subroles flag.
/// This single table feeds the axum router, the registry, and the coverage
/// check.
fn route_table() -> Vec<(&'static str, Method, RoleLevel, bool)> {
    vec![
        ("/", Method::GET, RoleLevel::External, true),
        ("/login", Method::POST, RoleLevel::External, true),
        ("/group", Method::POST, RoleLevel::External, true),
        ("/group/{id}", Method::GET, RoleLevel::GroupMember, true),
        ("/group/{id}", Method::PUT, RoleLevel::GroupCreator, true),
        ("/group/{id}", Method::DELETE, RoleLevel::GroupCreator, true),
        ("/group/{id}/songs", Method::GET, RoleLevel::GroupMember, true),
        ("/group/{id}/song", Method::POST, RoleLevel::GroupMember, true),
        ("/group/{id}/slots", Method::GET, RoleLevel::GroupMember, true),
        ("/group/{id}/slot", Method::POST, RoleLevel::GroupMember, true),
        ("/edit", Method::POST, RoleLevel::GroupMember, true),
        ("/edit/{id}", Method::GET, RoleLevel::GroupMember, true),
        ("/edit/{id}", Method::PUT, RoleLevel::EditCreator, false),
        ("/edit/{id}", Method::DELETE, RoleLevel::EditCreator, false),
        ("/admin/groups", Method::GET, RoleLevel::Admin, true),
    ]
}

async fn stub_handler() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "ok": true })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration before logging so the configured level applies
    let config = load_config(args.config.as_deref())
        .inspect_err(|e| eprintln!("Failed to load configuration: {e}"))?;

    // Initialize logging: RUST_LOG wins, then the CLI override, then config
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let registry_layer = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry_layer
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry_layer
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting stagepass");

    // Secrets are validated non-empty by the loader
    let admin_secret = config
        .auth
        .admin_secret
        .clone()
        .ok_or_else(|| anyhow::anyhow!("auth.admin_secret missing after validation"))?;
    let token_secret = config
        .auth
        .token
        .secret
        .clone()
        .ok_or_else(|| anyhow::anyhow!("auth.token.secret missing after validation"))?;

    // Build the registry from the shared route table
    let table = route_table();
    let mut builder = RouteRegistry::builder();
    for (pattern, method, role, include_subroles) in &table {
        builder = builder.rule(*pattern, method.clone(), *role, *include_subroles);
    }
    let registry = Arc::new(builder.build()?);

    // The registry must cover the router exactly, before serving traffic
    let exposed: Vec<(&str, Method)> = table
        .iter()
        .map(|(pattern, method, _, _)| (*pattern, method.clone()))
        .collect();
    registry.verify_coverage(&exposed)?;

    // Compose the engine
    let codec = Arc::new(TokenCodec::new(&token_secret));
    let store = Arc::new(MemoryStore::new());
    let resolver = RoleResolver::new(admin_secret, codec, store);
    let engine = Arc::new(AccessEngine::new(Arc::clone(&registry), resolver));

    // Build the router from the same table
    let mut router = axum::Router::new();
    for (pattern, method, _, _) in &table {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|e| anyhow::anyhow!("unsupported method {method}: {e}"))?;
        router = router.route(pattern, on(filter, stub_handler));
    }
    let router = router
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&engine),
            access_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, routes = registry.len(), "stagepass listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}
