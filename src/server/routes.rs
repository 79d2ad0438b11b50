/// API Routes definition

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::IdentityResolver;
use super::handlers;
use super::static_files;
use crate::core::{BackupManager, StatusReporter};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<BackupManager>,
    pub reporter: Arc<StatusReporter>,
    pub identity: Arc<IdentityResolver>,
}

impl AppState {
    pub fn new(manager: Arc<BackupManager>, identity: IdentityResolver) -> Self {
        let reporter = StatusReporter::new(manager.config_arc(), manager.runtime_arc());
        Self {
            manager,
            reporter: Arc::new(reporter),
            identity: Arc::new(identity),
        }
    }
}

pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/db_backup/", get(handlers::index))
        .route("/db_backup/:name/backup/", post(handlers::backup))
        .route("/db_backup/:name/restore/", post(handlers::restore))
        .nest_service("/static/db_backup", static_files::static_service())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}
