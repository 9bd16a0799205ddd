//! PDF exports of plan content
//!
//! Four presentations, all laid out by hand on fixed page geometry:
//! - full plan with cover, table of contents, running header and page numbers
//! - a single section
//! - a business-card sized emergency contact card
//! - an action checklist with a signature block

mod card;
mod checklist;
mod document;
pub mod layout;
pub mod text;

pub use card::{emergency_contacts, render_wallet_card, ContactLine};
pub use checklist::{checklist_groups, checklist_section, render_checklist, ChecklistGroup};
pub use document::{render_full_plan, render_section};
pub use text::{export_filename, strip_markdown};

use crate::errors::AppError;
use crate::plan::PlanContent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("A section name is required for section exports")]
    MissingSection,

    #[error("Plan has no scenario or procedure section to build a checklist from")]
    NoChecklistSection,

    #[error("Section '{0}' has no list items to build a checklist from")]
    EmptyChecklist(String),

    #[error("PDF encoding failed: {0}")]
    Pdf(String),
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::SectionNotFound(title) => AppError::SectionNotFound { title },
            ExportError::MissingSection => AppError::MissingField {
                field: "section".to_string(),
            },
            ExportError::NoChecklistSection | ExportError::EmptyChecklist(_) => {
                AppError::Validation {
                    message: err.to_string(),
                    field: Some("section".to_string()),
                }
            }
            ExportError::Pdf(message) => AppError::Export { message },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    #[default]
    Full,
    Section,
    Wallet,
    Checklist,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Full => "full",
            ExportKind::Section => "section",
            ExportKind::Wallet => "wallet",
            ExportKind::Checklist => "checklist",
        }
    }
}

/// A rendered file ready to be served as an attachment
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Render a plan in the requested presentation
pub fn export_plan(
    content: &PlanContent,
    kind: ExportKind,
    section: Option<&str>,
    version: Option<&str>,
) -> Result<PdfExport, ExportError> {
    let facility = content.facility_name.as_str();

    let export = match kind {
        ExportKind::Full => PdfExport {
            filename: export_filename(facility, "Emergency Response Plan"),
            bytes: render_full_plan(content, version)?,
        },
        ExportKind::Section => {
            let title = section
                .filter(|s| !s.trim().is_empty())
                .ok_or(ExportError::MissingSection)?;
            let (resolved, bytes) = render_section(content, title)?;
            PdfExport {
                filename: export_filename(facility, &resolved),
                bytes,
            }
        }
        ExportKind::Wallet => PdfExport {
            filename: export_filename(facility, "Wallet Card"),
            bytes: render_wallet_card(content)?,
        },
        ExportKind::Checklist => {
            let (resolved, bytes) = render_checklist(content, section)?;
            PdfExport {
                filename: export_filename(facility, &format!("{} Checklist", resolved)),
                bytes,
            }
        }
    };

    tracing::debug!(
        kind = kind.as_str(),
        filename = %export.filename,
        size = export.bytes.len(),
        "Rendered export"
    );
    Ok(export)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::plan::model::fixtures::retail_profile;
    use crate::plan::{PlanContent, Section, Subsection, TokenUsage};
    use chrono::Utc;

    pub fn sample_content() -> PlanContent {
        let mut procedures = Section::new(
            "Emergency Scenarios and Procedures",
            "Steps for each scenario.",
        );
        procedures.subsections = vec![
            Subsection {
                id: "fire".into(),
                title: "Fire".into(),
                content: "1. Pull the nearest alarm\n2. Evacuate via **marked** exits\n3. Call 911"
                    .into(),
            },
            Subsection {
                id: "power-outage".into(),
                title: "Power Outage".into(),
                content: "- Check the generator\n- Notify the store manager".into(),
            },
        ];

        PlanContent {
            generated_at: Utc::now(),
            facility_name: "Corner Market".into(),
            facility_type: "Retail".into(),
            executive_summary: "Keeps staff and customers safe.".into(),
            sections: vec![
                Section::new("Executive Summary", "Keeps staff and customers safe."),
                Section::new(
                    "Emergency Contacts",
                    "| Service | Name | Phone |\n|---|---|---|\n\
                     | Fire | Seattle FD | 911 |\n\
                     | Police (non-emergency) | SPD | 206-625-5011 |\n\
                     | Poison Control | National | 800-222-1222 |\n\
                     | Medical | Harborview | 206-744-3000 |",
                ),
                procedures,
            ],
            usage: TokenUsage::default(),
            facility_profile: retail_profile(),
            confidence: 72,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_content;
    use super::*;

    #[test]
    fn test_export_filenames() {
        let content = sample_content();

        let full = export_plan(&content, ExportKind::Full, None, Some("1.0")).unwrap();
        assert_eq!(full.filename, "Corner_Market_Emergency_Response_Plan.pdf");
        assert!(full.bytes.starts_with(b"%PDF"));

        let section = export_plan(&content, ExportKind::Section, Some("contacts"), None).unwrap();
        assert_eq!(section.filename, "Corner_Market_Emergency_Contacts.pdf");

        let wallet = export_plan(&content, ExportKind::Wallet, None, None).unwrap();
        assert_eq!(wallet.filename, "Corner_Market_Wallet_Card.pdf");

        let checklist = export_plan(&content, ExportKind::Checklist, None, None).unwrap();
        assert_eq!(
            checklist.filename,
            "Corner_Market_Emergency_Scenarios_and_Procedures_Checklist.pdf"
        );
    }

    #[test]
    fn test_section_export_errors() {
        let content = sample_content();
        assert!(matches!(
            export_plan(&content, ExportKind::Section, None, None),
            Err(ExportError::MissingSection)
        ));
        assert!(matches!(
            export_plan(&content, ExportKind::Section, Some("hazmat"), None),
            Err(ExportError::SectionNotFound(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let err: AppError = ExportError::SectionNotFound("x".into()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);

        let err: AppError = ExportError::EmptyChecklist("x".into()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
