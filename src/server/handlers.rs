/// API Request Handlers
/// Thin wrappers over the orchestrator and status reporter

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::routes::AppState;
use crate::core::error::{ExecError, OperationError, ResolveError, TransferError};
use crate::core::status::DatabaseStatus;
use crate::core::BackupArtifact;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

#[derive(Serialize)]
pub struct IndexData {
    databases: Vec<DatabaseStatus>,
    username: String,
    group: String,
}

#[derive(Deserialize)]
pub struct RestoreForm {
    date: Option<String>,
}

/// Error response carrying a status code and a JSON body
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        let status = operation_status(&err);
        if status.is_server_error() {
            error!(error = %err, "operation failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        error!(error = %err, "status snapshot failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

pub fn operation_status(err: &OperationError) -> StatusCode {
    match err {
        OperationError::UnknownDatabase(_) | OperationError::ArtifactNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        OperationError::MissingSelector => StatusCode::BAD_REQUEST,
        OperationError::Resolve(ResolveError::NotFound(_)) => StatusCode::NOT_FOUND,
        OperationError::Resolve(ResolveError::Ambiguous { .. }) => StatusCode::CONFLICT,
        OperationError::Resolve(ResolveError::Runtime(_)) => StatusCode::BAD_GATEWAY,
        OperationError::Exec(ExecError::TimedOut { .. }) => StatusCode::GATEWAY_TIMEOUT,
        OperationError::Exec(_) => StatusCode::BAD_GATEWAY,
        OperationError::Transfer(TransferError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        OperationError::Transfer(_) => StatusCode::BAD_GATEWAY,
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<IndexData>>, ApiError> {
    let identity = state.identity.identify_request(&headers).await;
    let snapshot = state.reporter.snapshot().await?;

    Ok(Json(ApiResponse::ok(IndexData {
        databases: snapshot.databases,
        username: identity.username,
        group: identity.group,
    })))
}

pub async fn backup(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<BackupArtifact>>, ApiError> {
    info!(database = %name, "backup requested");
    let artifact = state.manager.backup_database(&name).await?;
    Ok(Json(ApiResponse::ok(artifact)))
}

/// `date` comes from the form body or, failing that, the query string
pub async fn restore(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RestoreForm>,
    form: Option<Form<RestoreForm>>,
) -> Result<Json<ApiResponse<BackupArtifact>>, ApiError> {
    let date = form
        .and_then(|Form(form)| form.date)
        .filter(|d| !d.trim().is_empty())
        .or(query.date);

    info!(database = %name, date = ?date, "restore requested");
    let artifact = state.manager.restore_database(&name, date.as_deref()).await?;
    Ok(Json(ApiResponse::ok(artifact)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_operation_status_mapping() {
        let cases = [
            (OperationError::UnknownDatabase("x".into()), StatusCode::NOT_FOUND),
            (OperationError::MissingSelector, StatusCode::BAD_REQUEST),
            (
                OperationError::ArtifactNotFound {
                    database: "x".into(),
                    timestamp: "01-03-2024-10:15".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ResolveError::NotFound("x".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                ResolveError::Ambiguous {
                    name: "x".into(),
                    count: 2,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ResolveError::Runtime("down".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ExecError::TimedOut {
                    container: "abc".into(),
                    timeout: Duration::from_secs(60),
                }
                .into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ExecError::Start {
                    container: "abc".into(),
                    message: "boom".into(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TransferError::Download {
                    container: "abc".into(),
                    path: "/data/dump/x".into(),
                    message: "no such file".into(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(operation_status(&err), expected, "{}", err);
        }
    }
}
