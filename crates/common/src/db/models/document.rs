//! Uploaded document entity, also the extraction work queue

use crate::documents::ExtractedData;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Document processing status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Failed,
}

impl From<String> for DocumentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => DocumentStatus::Completed,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Processing,
        }
    }
}

impl From<DocumentStatus> for String {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Processing => "processing".to_string(),
            DocumentStatus::Completed => "completed".to_string(),
            DocumentStatus::Failed => "failed".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,

    pub uploaded_by: Uuid,

    #[sea_orm(column_type = "Text")]
    pub filename: String,

    pub file_size: i64,

    #[sea_orm(column_type = "Text")]
    pub mime_type: String,

    #[sea_orm(column_type = "Text")]
    pub storage_path: String,

    #[sea_orm(column_type = "Text")]
    pub content_hash: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub extracted_text: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub extracted_data: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub document_type: Option<String>,

    pub confidence_score: Option<f64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub processing_error: Option<String>,

    pub attempt_count: i32,

    pub next_attempt_at: Option<DateTimeWithTimeZone>,

    pub lease_expires_at: Option<DateTimeWithTimeZone>,

    pub input_tokens: i32,

    pub output_tokens: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    pub processed_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Get the document status as an enum
    pub fn document_status(&self) -> DocumentStatus {
        DocumentStatus::from(self.status.clone())
    }

    /// Check if the document is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.document_status(),
            DocumentStatus::Completed | DocumentStatus::Failed
        )
    }

    /// Structured data, empty when extraction has not produced any
    pub fn extracted(&self) -> ExtractedData {
        self.extracted_data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,

    #[sea_orm(has_many = "super::document_extraction::Entity")]
    Extractions,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::document_extraction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Extractions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversions() {
        assert_eq!(DocumentStatus::from("failed".to_string()), DocumentStatus::Failed);
        assert_eq!(DocumentStatus::from("weird".to_string()), DocumentStatus::Processing);
        assert_eq!(String::from(DocumentStatus::Completed), "completed");
    }
}
