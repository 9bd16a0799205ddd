//! Plan handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{authorize, load_plan};
use crate::AppState;
use erp_common::{
    auth::{AuthContext, Role},
    db::models::{Extraction, Plan},
    errors::{AppError, Result},
    plan::{generator::executive_summary, FacilityProfile, PlanContent, PlanStatus, PlanVersion, Section},
};

/// Full plan including content
#[derive(Serialize)]
pub struct PlanResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub version: String,
    pub status: PlanStatus,
    pub revision: i32,
    pub content: PlanContent,
    pub created_by: Uuid,
    pub created_at: String,
    pub updated_at: String,
    pub activated_at: Option<String>,
}

impl PlanResponse {
    pub(crate) fn from_plan(plan: Plan) -> Result<Self> {
        let content = plan.plan_content()?;
        Ok(Self {
            id: plan.id,
            organization_id: plan.organization_id,
            status: plan.plan_status(),
            version: plan.version,
            revision: plan.revision,
            content,
            created_by: plan.created_by,
            created_at: plan.created_at.to_rfc3339(),
            updated_at: plan.updated_at.to_rfc3339(),
            activated_at: plan.activated_at.map(|t| t.to_rfc3339()),
        })
    }
}

/// List entry without the section bodies
#[derive(Serialize)]
pub struct PlanSummary {
    pub id: Uuid,
    pub version: String,
    pub status: PlanStatus,
    pub revision: i32,
    pub facility_name: Option<String>,
    pub confidence: Option<u64>,
    pub created_at: String,
    pub activated_at: Option<String>,
}

impl From<Plan> for PlanSummary {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            status: plan.plan_status(),
            facility_name: plan
                .content
                .get("facility_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            confidence: plan.content.get("confidence").and_then(|v| v.as_u64()),
            version: plan.version,
            revision: plan.revision,
            created_at: plan.created_at.to_rfc3339(),
            activated_at: plan.activated_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSectionsRequest {
    pub sections: Vec<Section>,
    /// Revision the client edited; the stored one is used when absent
    #[serde(default)]
    pub revision: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: PlanStatus,
}

#[derive(Serialize)]
pub struct ExtractionResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub extraction_type: String,
    pub section_title: String,
    pub payload: serde_json::Value,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub applied: bool,
    pub applied_at: Option<String>,
    pub applied_by: Option<Uuid>,
    pub created_at: String,
}

impl From<Extraction> for ExtractionResponse {
    fn from(record: Extraction) -> Self {
        Self {
            id: record.id,
            document_id: record.document_id,
            extraction_type: record.extraction_type,
            section_title: record.section_title,
            payload: record.extracted_payload,
            input_tokens: record.input_tokens,
            output_tokens: record.output_tokens,
            applied: record.applied,
            applied_at: record.applied_at.map(|t| t.to_rfc3339()),
            applied_by: record.applied_by,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Content writes are refused once a plan is archived
pub(crate) fn ensure_editable(plan: &Plan) -> Result<()> {
    if plan.plan_status() == PlanStatus::Archived {
        return Err(AppError::InvalidState {
            message: format!("Plan {} is archived", plan.id),
        });
    }
    Ok(())
}

pub async fn list_plans(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<PlanSummary>>> {
    authorize(&state, org_id, &auth, Role::Viewer).await?;

    let plans = state.repo.list_plans(org_id).await?;
    Ok(Json(plans.into_iter().map(PlanSummary::from).collect()))
}

/// Generate a new draft plan from a facility profile
pub async fn generate_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(org_id): Path<Uuid>,
    Json(profile): Json<FacilityProfile>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    profile.validate()?;
    authorize(&state, org_id, &auth, Role::Editor).await?;

    let content = state.generator.generate(&profile).await?;

    let versions = state.repo.plan_versions(org_id).await?;
    let version = PlanVersion::next_major(versions.iter().map(String::as_str));
    let plan = state
        .repo
        .create_plan(org_id, auth.user_id, version, &content)
        .await?;

    tracing::info!(
        plan_id = %plan.id,
        organization_id = %org_id,
        version = %plan.version,
        confidence = content.confidence,
        "Plan generated"
    );

    Ok((StatusCode::CREATED, Json(PlanResponse::from_plan(plan)?)))
}

pub async fn get_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanResponse>> {
    let plan = load_plan(&state, id, &auth, Role::Viewer).await?;
    Ok(Json(PlanResponse::from_plan(plan)?))
}

/// Replace the section list
pub async fn update_sections(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSectionsRequest>,
) -> Result<Json<PlanResponse>> {
    let plan = load_plan(&state, id, &auth, Role::Editor).await?;
    ensure_editable(&plan)?;

    if request.sections.iter().any(|s| s.title.trim().is_empty()) {
        return Err(AppError::Validation {
            message: "Section titles must not be empty".to_string(),
            field: Some("sections".to_string()),
        });
    }

    let mut content = plan.plan_content()?;
    content.executive_summary = executive_summary(&request.sections);
    content.sections = request.sections;

    let expected = request.revision.unwrap_or(plan.revision);
    let updated = state.repo.update_plan_content(id, expected, &content).await?;

    tracing::info!(plan_id = %id, revision = updated.revision, "Plan sections replaced");
    Ok(Json(PlanResponse::from_plan(updated)?))
}

/// Move a plan to review, back to draft, or into the archive
pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<PlanResponse>> {
    load_plan(&state, id, &auth, Role::Editor).await?;

    let plan = state.repo.set_plan_status(id, request.status).await?;
    Ok(Json(PlanResponse::from_plan(plan)?))
}

/// Make the plan the organization's only active plan
pub async fn activate_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanResponse>> {
    load_plan(&state, id, &auth, Role::Editor).await?;

    let plan = state.repo.activate_plan(id).await?;
    Ok(Json(PlanResponse::from_plan(plan)?))
}

/// Copy the plan's content into a new draft with the next minor version
pub async fn create_version(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    let source = load_plan(&state, id, &auth, Role::Editor).await?;
    let content = source.plan_content()?;

    let plan = create_minor_version(&state, &source, &auth, &content).await?;
    tracing::info!(plan_id = %plan.id, source_plan_id = %id, version = %plan.version, "Plan version created");

    Ok((StatusCode::CREATED, Json(PlanResponse::from_plan(plan)?)))
}

/// Regenerate from the stored facility profile into a new draft
pub async fn refresh_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    let source = load_plan(&state, id, &auth, Role::Editor).await?;
    let profile = source.plan_content()?.facility_profile;

    let content = state.generator.generate(&profile).await?;

    let plan = create_minor_version(&state, &source, &auth, &content).await?;
    tracing::info!(plan_id = %plan.id, source_plan_id = %id, version = %plan.version, "Plan refreshed");

    Ok((StatusCode::CREATED, Json(PlanResponse::from_plan(plan)?)))
}

async fn create_minor_version(
    state: &AppState,
    source: &Plan,
    auth: &AuthContext,
    content: &PlanContent,
) -> Result<Plan> {
    let versions = state.repo.plan_versions(source.organization_id).await?;
    let version = source
        .plan_version()
        .next_minor(versions.iter().map(String::as_str));

    state
        .repo
        .create_plan(source.organization_id, auth.user_id, version, content)
        .await
}

/// Document data applied to this plan, newest first
pub async fn list_extractions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ExtractionResponse>>> {
    load_plan(&state, id, &auth, Role::Viewer).await?;

    let records = state.repo.list_extractions_for_plan(id).await?;
    Ok(Json(records.into_iter().map(ExtractionResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan(status: PlanStatus) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            version: "2.1".to_string(),
            status: status.as_str().to_string(),
            content: serde_json::json!({
                "facility_name": "Corner Market",
                "confidence": 85,
            }),
            created_by: Uuid::new_v4(),
            revision: 4,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            activated_at: None,
        }
    }

    #[test]
    fn test_archived_plans_are_read_only() {
        assert!(ensure_editable(&plan(PlanStatus::Draft)).is_ok());
        assert!(ensure_editable(&plan(PlanStatus::Active)).is_ok());
        assert!(matches!(
            ensure_editable(&plan(PlanStatus::Archived)),
            Err(AppError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_summary_reads_content_fields() {
        let summary = PlanSummary::from(plan(PlanStatus::Review));
        assert_eq!(summary.facility_name.as_deref(), Some("Corner Market"));
        assert_eq!(summary.confidence, Some(85));
        assert_eq!(summary.status, PlanStatus::Review);
        assert_eq!(summary.revision, 4);
    }

    #[test]
    fn test_update_request_revision_is_optional() {
        let request: UpdateSectionsRequest = serde_json::from_value(serde_json::json!({
            "sections": [{ "id": "scope", "title": "Scope", "content": "All staff" }]
        }))
        .unwrap();
        assert_eq!(request.revision, None);
        assert_eq!(request.sections[0].title, "Scope");
    }
}
