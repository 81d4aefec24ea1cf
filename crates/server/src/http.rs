#![forbid(unsafe_code)]

use crate::allocator::{AllocateError, AllocatorService};
use crate::config::{Config, HEALTH_ROUTE};
use crate::format_rfc3339;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW,
};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

const ALLOWED_METHODS: &str = "GET, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateSuccessBody {
    pub success: bool,
    pub form_code: String,
    pub version: String,
    pub revision_date: String,
}

#[derive(Debug, Serialize)]
pub struct AllocateFailureBody {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("counter store setup failed: {0}")]
    Store(#[from] qaf_storage::StoreError),
}

pub fn router(service: AllocatorService, route: &str) -> Router {
    Router::new()
        .route(
            route,
            get(allocate_code)
                .head(head_not_allowed)
                .options(preflight),
        )
        .route(HEALTH_ROUTE, get(healthz))
        .with_state(Arc::new(service))
}

/// Installs the store, binds the configured address and serves until Ctrl-C.
pub async fn run(config: Config) -> Result<(), ServeError> {
    let service = AllocatorService::new(
        config.storage_dir.clone(),
        config.key.clone(),
        config.prefix.clone(),
        config.busy_timeout,
        config.request_timeout,
    );
    service.install()?;

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        route = %config.route,
        key = %config.key,
        prefix = %config.prefix,
        storage_dir = %config.storage_dir.display(),
        "form code allocator listening"
    );
    axum::serve(listener, router(service, &config.route))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("form code allocator stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "installing Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
}

async fn allocate_code(State(service): State<Arc<AllocatorService>>) -> Response {
    match service.allocate().await {
        Ok(allocation) => (
            StatusCode::OK,
            [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
            Json(AllocateSuccessBody {
                success: true,
                form_code: allocation.form_code.into_string(),
                version: allocation.version.to_string(),
                revision_date: format_rfc3339(allocation.revision_date),
            }),
        )
            .into_response(),
        Err(err) => {
            log_failure(&service, &err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                Json(AllocateFailureBody {
                    success: false,
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn log_failure(service: &AllocatorService, err: &AllocateError) {
    error!(
        key = %service.key(),
        prefix = %service.prefix(),
        error = %err,
        "form code allocation failed"
    );
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
            (ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
        ],
    )
}

// axum answers HEAD through the GET handler, which would consume a code.
async fn head_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [
            (ALLOW, ALLOWED_METHODS),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
    )
}

async fn healthz(State(service): State<Arc<AllocatorService>>) -> (StatusCode, Json<HealthBody>) {
    let probe_service = service.clone();
    let probe = tokio::task::spawn_blocking(move || probe_service.probe()).await;
    let reason = match probe {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) => Some(err.to_string()),
    };
    match reason {
        None => (
            StatusCode::OK,
            Json(HealthBody {
                status: "ok",
                key: Some(service.key().to_string()),
                prefix: Some(service.prefix().to_string()),
                reason: None,
            }),
        ),
        Some(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthBody {
                status: "error",
                key: None,
                prefix: None,
                reason: Some(reason),
            }),
        ),
    }
}
