//! Plan entity
//!
//! `content` holds the serialized [`PlanContent`] document. `revision` is
//! bumped on every content write and checked by writers.

use crate::plan::{PlanCandidate, PlanContent, PlanStatus, PlanVersion};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub version: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub content: Json,

    pub created_by: Uuid,

    pub revision: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    pub activated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Unknown status strings are treated as draft
    pub fn plan_status(&self) -> PlanStatus {
        PlanStatus::parse(&self.status).unwrap_or(PlanStatus::Draft)
    }

    pub fn plan_version(&self) -> PlanVersion {
        self.version.parse().unwrap_or(PlanVersion::FIRST)
    }

    pub fn plan_content(&self) -> crate::Result<PlanContent> {
        PlanContent::from_json(&self.content)
    }

    pub fn candidate(&self) -> PlanCandidate {
        PlanCandidate {
            id: self.id,
            status: self.plan_status(),
            created_at: self.created_at.into(),
        }
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
