//! SeaORM entity models
//!
//! Database entities for My-ERP-Plan

mod document;
mod document_extraction;
mod organization;
mod organization_member;
mod plan;

pub use organization::{
    ActiveModel as OrganizationActiveModel, Column as OrganizationColumn,
    Entity as OrganizationEntity, Model as Organization,
};

pub use organization_member::{
    ActiveModel as MemberActiveModel, Column as MemberColumn, Entity as MemberEntity,
    Model as Member,
};

pub use plan::{
    ActiveModel as PlanActiveModel, Column as PlanColumn, Entity as PlanEntity, Model as Plan,
};

pub use document::{
    ActiveModel as DocumentActiveModel, Column as DocumentColumn, DocumentStatus,
    Entity as DocumentEntity, Model as Document,
};

pub use document_extraction::{
    ActiveModel as ExtractionActiveModel, Column as ExtractionColumn,
    Entity as ExtractionEntity, Model as Extraction,
};
