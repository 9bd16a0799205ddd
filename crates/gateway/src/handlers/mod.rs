//! API handlers module

pub mod chat;
pub mod documents;
pub mod exports;
pub mod health;
pub mod organizations;
pub mod plans;

use erp_common::{
    auth::{AuthContext, Role},
    db::models::{Document, Plan},
    errors::{AppError, Result},
};
use uuid::Uuid;

use crate::AppState;

/// Caller's role in the organization, at least `required`
pub(crate) async fn authorize(
    state: &AppState,
    organization_id: Uuid,
    auth: &AuthContext,
    required: Role,
) -> Result<Role> {
    let role = state
        .repo
        .member_role(organization_id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden {
            message: "Not a member of this organization".to_string(),
        })?;

    role.require(required)?;
    Ok(role)
}

/// Load a plan the caller may access with `required`
pub(crate) async fn load_plan(
    state: &AppState,
    plan_id: Uuid,
    auth: &AuthContext,
    required: Role,
) -> Result<Plan> {
    let plan = state
        .repo
        .find_plan(plan_id)
        .await?
        .ok_or_else(|| AppError::PlanNotFound {
            id: plan_id.to_string(),
        })?;

    authorize(state, plan.organization_id, auth, required).await?;
    Ok(plan)
}

/// Load a document the caller may access with `required`
pub(crate) async fn load_document(
    state: &AppState,
    document_id: Uuid,
    auth: &AuthContext,
    required: Role,
) -> Result<Document> {
    let document = state
        .repo
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    authorize(state, document.organization_id, auth, required).await?;
    Ok(document)
}
