//! Plan generation: profile in, structured plan content out

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use super::markdown::parse_erp_response;
use super::model::{FacilityProfile, PlanContent, Section};
use super::prompt::{build_system_prompt, build_user_prompt};
use crate::errors::{AppError, Result};
use crate::llm::{CompletionRequest, LanguageModel};

/// Generates plan content with a language model
#[derive(Clone)]
pub struct PlanGenerator {
    llm: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// Prompt the model with the profile and parse its markdown into sections
    #[instrument(skip(self, profile), fields(facility = %profile.name, model = %self.llm.model_name()))]
    pub async fn generate(&self, profile: &FacilityProfile) -> Result<PlanContent> {
        let started = Instant::now();
        let request = CompletionRequest::new(build_user_prompt(profile), self.max_tokens)
            .with_system(build_system_prompt(profile));

        let completion = self.llm.complete(&request).await?;
        let parsed = parse_erp_response(&completion.text);

        if parsed.sections.is_empty() {
            crate::metrics::record_plan_generation(false, 0, started.elapsed().as_secs_f64());
            return Err(AppError::Llm {
                code: "unstructured_response".to_string(),
                message: "Model reply contained no plan sections".to_string(),
                status: None,
                retryable: false,
            });
        }

        crate::metrics::record_plan_generation(
            true,
            parsed.confidence,
            started.elapsed().as_secs_f64(),
        );
        info!(
            sections = parsed.sections.len(),
            confidence = parsed.confidence,
            warnings = parsed.warnings.len(),
            tokens = completion.usage.total(),
            "Generated plan"
        );

        Ok(PlanContent {
            generated_at: Utc::now(),
            facility_name: profile.name.clone(),
            facility_type: profile.type_label(),
            executive_summary: executive_summary(&parsed.sections),
            sections: parsed.sections,
            usage: completion.usage,
            facility_profile: profile.clone(),
            confidence: parsed.confidence,
            warnings: parsed.warnings,
        })
    }
}

/// Body of the executive summary section, if the plan has one
pub fn executive_summary(sections: &[Section]) -> String {
    sections
        .iter()
        .find(|s| s.id.contains("executive-summary"))
        .map(|s| s.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;
    use crate::plan::model::fixtures::retail_profile;

    const EIGHT_SECTIONS: &str = "\
## Executive Summary
Corner Market keeps staff and customers safe.

## Purpose and Scope
Applies to all staff at the Seattle store.

## Emergency Contacts
| Role | Name | Phone |
|------|------|-------|
| Fire | Seattle FD | 911 |

## Chain of Command
Store manager, then shift lead.

## Hazard-Specific Response Procedures
Follow the steps for the hazard at hand.
### Fire
1. Pull the alarm.
### Active Shooter
1. Run, hide, fight.

## Evacuation Procedures
Exit through the front doors to the north lot.

## Communication Plan
Use the group text list.

## Training and Drills
Quarterly fire drills.
";

    #[tokio::test]
    async fn test_generates_eight_sections_in_order() {
        let llm = Arc::new(MockLanguageModel::with_responses([EIGHT_SECTIONS]));
        let generator = PlanGenerator::new(llm.clone(), 16_000);

        let content = generator.generate(&retail_profile()).await.unwrap();

        assert_eq!(content.sections.len(), 8);
        assert!(content.sections.iter().all(|s| !s.content.is_empty()));
        assert_eq!(content.sections[0].id, "executive-summary");
        assert_eq!(content.sections[7].title, "Training and Drills");
        assert_eq!(content.sections[4].subsections.len(), 2);
        assert_eq!(
            content.executive_summary,
            "Corner Market keeps staff and customers safe."
        );
        assert_eq!(content.facility_type, "Retail");

        // All six required ids present, subsections present, short content
        assert!(content.confidence >= 60);
        assert!(content.confidence <= 100);

        let request = &llm.requests()[0];
        assert!(request.system.as_deref().unwrap().contains("OSHA"));
        assert_eq!(request.max_tokens, 16_000);
    }

    #[tokio::test]
    async fn test_unstructured_reply_is_an_error() {
        let llm = Arc::new(MockLanguageModel::with_responses(["I cannot help with that."]));
        let generator = PlanGenerator::new(llm, 100);
        let err = generator.generate(&retail_profile()).await.unwrap_err();
        assert!(matches!(err, AppError::Llm { retryable: false, .. }));
    }
}
