/// HTTP server module for dockup
/// Exposes the status page data and the backup/restore actions

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod static_files;

pub use routes::{create_router, AppState};

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{BackupManager, Scheduler};

pub async fn run(
    manager: Arc<BackupManager>,
    host: String,
    port: u16,
    enable_cors: bool,
    enable_scheduler: bool,
) -> anyhow::Result<()> {
    // Fail before binding if the backup root is unusable
    manager.store().ensure_root()?;

    let identity = auth::IdentityResolver::from_env();
    let auth_url = identity.auth_url().to_string();
    let state = AppState::new(Arc::clone(&manager), identity);
    let app = create_router(state, enable_cors);

    let scheduler = if enable_scheduler {
        let handle = Scheduler::new(Arc::clone(&manager)).start();
        info!(databases = ?handle.databases(), "scheduler started");
        Some(handle)
    } else {
        warn!("scheduler disabled, backups run on request only");
        None
    };

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("🚀 dockup server");
    println!("   📍 Page data: http://{}/db_backup/", addr);
    println!("   🗂  Static:    http://{}/static/db_backup/", addr);
    println!("   🔑 Identity:  {}", auth_url);
    println!(
        "   ⏰ Scheduler: {}",
        if scheduler.is_some() { "enabled" } else { "disabled" }
    );
    println!();
    println!("📚 Endpoints:");
    println!("   GET  /db_backup/               - Databases, status and backups");
    println!("   POST /db_backup/:name/backup/  - Run a backup now");
    println!("   POST /db_backup/:name/restore/ - Restore backup (form field: date)");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.shutdown();
    }
    info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
