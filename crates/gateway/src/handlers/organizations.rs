//! Organization handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use erp_common::{
    auth::{AuthContext, Role},
    db::models::Organization,
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Serialize)]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

impl OrganizationResponse {
    fn new(organization: Organization, role: Role) -> Self {
        Self {
            id: organization.id,
            name: organization.name,
            role,
            created_at: organization.created_at.to_rfc3339(),
        }
    }
}

/// Create an organization with the caller as its admin
pub async fn create_organization(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>)> {
    request.validate()?;

    let organization = state
        .repo
        .create_organization(request.name.trim().to_string(), auth.user_id)
        .await?;

    // No transaction spans both inserts; undo the organization if membership fails
    if let Err(e) = state
        .repo
        .add_member(organization.id, auth.user_id, Role::Admin)
        .await
    {
        tracing::error!(
            organization_id = %organization.id,
            error = %e,
            "Membership creation failed, removing organization"
        );
        if let Err(cleanup) = state.repo.delete_organization(organization.id).await {
            tracing::error!(
                organization_id = %organization.id,
                error = %cleanup,
                "Failed to remove organization"
            );
        }
        return Err(e);
    }

    tracing::info!(
        organization_id = %organization.id,
        user_id = %auth.user_id,
        "Organization created"
    );

    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse::new(organization, Role::Admin)),
    ))
}

/// Organizations the caller belongs to
pub async fn list_organizations(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<OrganizationResponse>>> {
    let organizations = state
        .repo
        .list_organizations_for_user(auth.user_id)
        .await?
        .into_iter()
        .map(|(organization, role)| OrganizationResponse::new(organization, role))
        .collect();

    Ok(Json(organizations))
}
