//! Chat-driven plan editing
//!
//! The model only turns the message into a structured edit. The edit itself
//! is applied locally so the model never rewrites plan text it was not asked
//! to touch.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{load_plan, plans::ensure_editable};
use crate::AppState;
use erp_common::{
    auth::{AuthContext, Role},
    errors::Result,
    llm::CompletionRequest,
    metrics,
    plan::{
        apply_edit, build_intent_prompt, generator::executive_summary, parse_edit_intent,
        INTENT_SYSTEM_PROMPT, UNCLEAR_REQUEST_REPLY,
    },
};

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,

    #[serde(default)]
    pub revision: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub changes: Vec<String>,
    pub revision: i32,
}

pub async fn chat_edit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    request.validate()?;

    let plan = load_plan(&state, id, &auth, Role::Editor).await?;
    ensure_editable(&plan)?;
    let mut content = plan.plan_content()?;

    let prompt = CompletionRequest::new(
        build_intent_prompt(&content.sections, &request.message),
        state.config.llm.small_max_tokens,
    )
    .with_system(INTENT_SYSTEM_PROMPT)
    .with_temperature(0.0);

    let completion = state.llm.complete(&prompt).await?;

    let intent = match parse_edit_intent(&completion.text) {
        Ok(intent) => intent,
        Err(e) => {
            tracing::warn!(plan_id = %id, error = %e, "Could not parse edit intent");
            metrics::record_chat_edit("unknown", "unclear");
            return Ok(Json(ChatResponse {
                reply: UNCLEAR_REQUEST_REPLY.to_string(),
                applied: false,
                action: None,
                changes: Vec::new(),
                revision: plan.revision,
            }));
        }
    };

    let action = intent.action.as_str();
    let outcome = apply_edit(std::mem::take(&mut content.sections), &intent);

    if outcome.is_noop() {
        metrics::record_chat_edit(action, "noop");
        return Ok(Json(ChatResponse {
            reply: format!(
                "No changes were made. {}",
                intent
                    .explanation
                    .as_deref()
                    .unwrap_or("The text or section you described was not found in the plan.")
            ),
            applied: false,
            action: Some(action.to_string()),
            changes: Vec::new(),
            revision: plan.revision,
        }));
    }

    content.executive_summary = executive_summary(&outcome.sections);
    content.sections = outcome.sections;

    let expected = request.revision.unwrap_or(plan.revision);
    let updated = state.repo.update_plan_content(id, expected, &content).await?;
    metrics::record_chat_edit(action, "applied");

    tracing::info!(
        plan_id = %id,
        action,
        changes = outcome.changes.len(),
        revision = updated.revision,
        "Chat edit applied"
    );

    let reply = intent
        .explanation
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| outcome.changes.join("; "));

    Ok(Json(ChatResponse {
        reply,
        applied: true,
        action: Some(action.to_string()),
        changes: outcome.changes,
        revision: updated.revision,
    }))
}
