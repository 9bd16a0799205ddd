//! Document upload and merge handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{authorize, load_document};
use crate::AppState;
use erp_common::{
    auth::{AuthContext, Role},
    db::{
        models::{Document, DocumentStatus},
        NewDocument, NewExtraction,
    },
    documents::{is_allowed_mime_type, ExtractedData},
    errors::{AppError, Result},
    plan::{generator::executive_summary, merge_document, Category, TokenUsage},
};

/// Document metadata and, once completed, its extracted data
#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub document_type: Option<String>,
    pub confidence_score: Option<f64>,
    pub extracted_data: Option<ExtractedData>,
    pub processing_error: Option<String>,
    pub attempt_count: i32,
    pub created_at: String,
    pub processed_at: Option<String>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        let extracted_data = document.extracted_data.as_ref().map(|_| document.extracted());
        Self {
            id: document.id,
            organization_id: document.organization_id,
            status: document.document_status(),
            filename: document.filename,
            file_size: document.file_size,
            mime_type: document.mime_type,
            document_type: document.document_type,
            confidence_score: document.confidence_score,
            extracted_data,
            processing_error: document.processing_error,
            attempt_count: document.attempt_count,
            created_at: document.created_at.to_rfc3339(),
            processed_at: document.processed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyDocumentRequest {
    pub categories: Vec<Category>,
}

#[derive(Serialize)]
pub struct AppliedSection {
    pub category: Category,
    pub section_title: String,
    pub created: bool,
    pub item_count: usize,
}

#[derive(Serialize)]
pub struct ApplyDocumentResponse {
    pub plan_id: Uuid,
    pub revision: i32,
    pub applied: Vec<AppliedSection>,
    pub skipped: Vec<Category>,
}

/// Accept a multipart upload and queue it for extraction
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(org_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    authorize(&state, org_id, &auth, Role::Editor).await?;

    let limit = state.config.storage.max_upload_bytes;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::InvalidFormat {
        message: e.to_string(),
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AppError::MissingField {
                field: "filename".to_string(),
            })?;
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        if !is_allowed_mime_type(&mime_type) {
            return Err(AppError::UnsupportedMediaType { mime_type });
        }

        let bytes = field.bytes().await.map_err(|e| AppError::InvalidFormat {
            message: e.to_string(),
        })?;
        upload = Some((filename, mime_type, bytes));
        break;
    }

    let (filename, mime_type, bytes) = upload.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;

    if bytes.is_empty() {
        return Err(AppError::Validation {
            message: "Uploaded file is empty".to_string(),
            field: Some("file".to_string()),
        });
    }
    if bytes.len() > limit {
        return Err(AppError::PayloadTooLarge {
            size: bytes.len(),
            limit,
        });
    }

    let document_id = Uuid::new_v4();
    let stored = state.storage.put(org_id, document_id, &filename, &bytes).await?;

    let created = state
        .repo
        .create_document(NewDocument {
            id: document_id,
            organization_id: org_id,
            uploaded_by: auth.user_id,
            filename,
            file_size: stored.size as i64,
            mime_type,
            storage_path: stored.path.clone(),
            content_hash: stored.content_hash,
        })
        .await;

    let document = match created {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&stored.path).await {
                tracing::error!(path = %stored.path, error = %cleanup, "Failed to remove orphaned upload");
            }
            return Err(e);
        }
    };

    tracing::info!(
        document_id = %document.id,
        organization_id = %org_id,
        size = document.file_size,
        mime_type = %document.mime_type,
        "Document queued for extraction"
    );

    Ok((StatusCode::ACCEPTED, Json(DocumentResponse::from(document))))
}

pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<DocumentResponse>>> {
    authorize(&state, org_id, &auth, Role::Viewer).await?;

    let documents = state.repo.list_documents(org_id).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let document = load_document(&state, id, &auth, Role::Viewer).await?;
    Ok(Json(DocumentResponse::from(document)))
}

/// Merge selected categories of a completed document into the target plan
pub async fn apply_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyDocumentRequest>,
) -> Result<Json<ApplyDocumentResponse>> {
    if request.categories.is_empty() {
        return Err(AppError::Validation {
            message: "Select at least one category to apply".to_string(),
            field: Some("categories".to_string()),
        });
    }

    let document = load_document(&state, id, &auth, Role::Editor).await?;
    if document.document_status() != DocumentStatus::Completed {
        return Err(AppError::InvalidState {
            message: format!("Document {} has not finished processing", id),
        });
    }

    let plan = state
        .repo
        .resolve_target_plan(document.organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "plan".to_string(),
            id: format!("active or draft plan of organization {}", document.organization_id),
        })?;

    let mut content = plan.plan_content()?;
    let outcome = merge_document(
        std::mem::take(&mut content.sections),
        &document.extracted(),
        &request.categories,
        document.id,
    );

    if outcome.applied.is_empty() {
        tracing::info!(document_id = %id, plan_id = %plan.id, "Document had no data for the selected categories");
        return Ok(Json(ApplyDocumentResponse {
            plan_id: plan.id,
            revision: plan.revision,
            applied: Vec::new(),
            skipped: outcome.skipped,
        }));
    }

    content.executive_summary = executive_summary(&outcome.sections);
    content.sections = outcome.sections;

    let usage = TokenUsage {
        input_tokens: document.input_tokens.max(0) as u32,
        output_tokens: document.output_tokens.max(0) as u32,
    };
    let records = outcome
        .applied
        .iter()
        .map(|a| NewExtraction {
            document_id: document.id,
            extraction_type: a.category.as_str().to_string(),
            section_title: a.section_title.clone(),
            payload: a.payload.clone(),
            usage,
        })
        .collect();

    let (updated, _) = state
        .repo
        .apply_document_merge(plan.id, plan.revision, &content, auth.user_id, records)
        .await?;

    tracing::info!(
        document_id = %id,
        plan_id = %updated.id,
        applied = outcome.applied.len(),
        skipped = outcome.skipped.len(),
        revision = updated.revision,
        "Document applied to plan"
    );

    Ok(Json(ApplyDocumentResponse {
        plan_id: updated.id,
        revision: updated.revision,
        applied: outcome
            .applied
            .into_iter()
            .map(|a| AppliedSection {
                category: a.category,
                section_title: a.section_title,
                created: a.created,
                item_count: a.item_count,
            })
            .collect(),
        skipped: outcome.skipped,
    }))
}
