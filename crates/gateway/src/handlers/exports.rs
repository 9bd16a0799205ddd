//! PDF export handler

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use super::load_plan;
use crate::AppState;
use erp_common::{
    auth::{AuthContext, Role},
    errors::{AppError, Result},
    export::{self, ExportKind, PDF_CONTENT_TYPE},
    metrics,
};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub kind: ExportKind,
    pub section: Option<String>,
}

pub async fn export_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let plan = load_plan(&state, id, &auth, Role::Viewer).await?;
    let content = plan.plan_content()?;
    let version = plan.version;
    let kind = query.kind;

    // Layout is CPU bound
    let pdf = tokio::task::spawn_blocking(move || {
        export::export_plan(&content, kind, query.section.as_deref(), Some(&version))
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("Export task failed: {}", e),
    })??;

    metrics::record_export(kind.as_str());
    tracing::info!(
        plan_id = %id,
        kind = kind.as_str(),
        filename = %pdf.filename,
        size = pdf.bytes.len(),
        "Plan exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pdf.filename),
            ),
        ],
        pdf.bytes,
    )
        .into_response())
}
