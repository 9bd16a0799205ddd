//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: Probe,
    pub upload_store: Probe,
}

/// Outcome of one dependency probe
#[derive(Serialize)]
pub struct Probe {
    pub up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Probe {
    fn from_outcome(started: Instant, outcome: Result<(), String>) -> Self {
        match outcome {
            Ok(()) => Self {
                up: true,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Err(error) => Self {
                up: false,
                latency_ms: None,
                error: Some(error),
            },
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: erp_common::VERSION,
    })
}

/// 503 until the database answers and the upload directory exists
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let started = Instant::now();
    let database = Probe::from_outcome(started, state.db.ping().await.map_err(|e| e.to_string()));

    let started = Instant::now();
    let upload_store = Probe::from_outcome(started, upload_dir_ready(state.storage.root()).await);

    let ready = database.up && upload_store.up;
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "not_ready" },
            database,
            upload_store,
        }),
    )
}

async fn upload_dir_ready(root: &std::path::Path) -> Result<(), String> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(format!("{} is not a directory", root.display())),
        Err(e) => Err(format!("{}: {}", root.display(), e)),
    }
}
