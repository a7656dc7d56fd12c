use axum::{routing::get, serve, Router};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use snippet_hub::api;
use snippet_hub_core::auth::Hs256Verifier;
use snippet_hub_core::storage::memory::{MemoryFileStore, MemoryUserStore};

#[derive(Parser)]
#[command(name = "snippet-hub", about = "Code snippet sharing service")]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Secret for verifying HS256 session tokens.
    #[arg(long, env = "SNIPPET_HUB_JWT_SECRET", default_value = "dev-secret")]
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let state = api::AppState::new(
        Arc::new(MemoryFileStore::new()),
        Arc::new(MemoryUserStore::new()),
        Arc::new(Hs256Verifier::new(&args.jwt_secret)),
    );

    let app = Router::new()
        .merge(api::router(state))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&args.bind).await?;
    tracing::info!("listening on {}", args.bind);
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
