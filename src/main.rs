//! Bookstore - catalog API with token authentication and role-based access

use anyhow::{Context, Result};
use bookstore_backend::{
    auth::SqliteUserStore,
    books::SqliteBookStore,
    router, AppState, Config,
};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    let db_path = config.resolved_database_path();
    let user_store = Arc::new(
        SqliteUserStore::new(&db_path)
            .with_context(|| format!("Failed to open user store at {}", db_path))?,
    );
    let book_store = Arc::new(
        SqliteBookStore::new(&db_path)
            .with_context(|| format!("Failed to open book store at {}", db_path))?,
    );
    info!("📚 Database initialized at: {}", db_path);

    let tokens = Arc::new(config.token_service());
    let state = AppState::new(user_store, book_store, tokens, config.password_hasher());
    info!(
        access_ttl_secs = config.access_ttl_secs,
        refresh_ttl_secs = config.refresh_ttl_secs,
        bcrypt_cost = config.bcrypt_cost,
        "🔐 Authentication initialized"
    );

    match config.admin_credentials() {
        Some((username, password)) => {
            let auth = state.auth.clone();
            let (username, password) = (username.to_string(), password.to_string());
            let created =
                tokio::task::spawn_blocking(move || auth.ensure_admin(&username, &password))
                    .await
                    .context("Admin bootstrap task failed")?
                    .context("Failed to bootstrap admin account")?;
            if !created {
                info!("Admin account already present, bootstrap skipped");
            }
        }
        None => warn!("ADMIN_USERNAME not set; no admin account will be bootstrapped"),
    }

    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookstore_backend=debug,bookstore=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory (when run with --manifest-path from elsewhere)
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
