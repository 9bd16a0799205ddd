//! Audit record of document data merged into a plan

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_extractions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    pub plan_id: Uuid,

    pub organization_id: Uuid,

    /// contacts, procedures, facility_info or equipment
    #[sea_orm(column_type = "Text")]
    pub extraction_type: String,

    #[sea_orm(column_type = "Text")]
    pub section_title: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub extracted_payload: Json,

    pub input_tokens: i32,

    pub output_tokens: i32,

    pub applied: bool,

    pub applied_at: Option<DateTimeWithTimeZone>,

    pub applied_by: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id"
    )]
    Document,

    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
