//! Emergency response plan engine
//!
//! Provides:
//! - Prompt building from a facility profile
//! - Markdown parsing into sections with a confidence score
//! - Chat-driven section edits
//! - Merging extracted document data
//! - Version numbering and status lifecycle

pub mod blocks;
pub mod confidence;
pub mod generator;
pub mod intent;
pub mod lifecycle;
pub mod markdown;
pub mod merge;
pub mod model;
pub mod mutator;
pub mod prompt;
pub mod slug;
pub mod version;

pub use blocks::{parse_blocks, Block};
pub use generator::PlanGenerator;
pub use intent::{
    build_intent_prompt, parse_edit_intent, IntentParseError, INTENT_SYSTEM_PROMPT,
    UNCLEAR_REQUEST_REPLY,
};
pub use lifecycle::{select_target_plan, PlanCandidate, PlanStatus, TargetSelection};
pub use markdown::{parse_erp_response, parse_sections, ParsedPlan};
pub use merge::{merge_document, AppliedCategory, Category, MergeOutcome};
pub use model::{
    FacilityProfile, PlanContent, Section, SectionMetadata, Subsection, TokenUsage,
};
pub use mutator::{apply_edit, find_section, EditAction, EditIntent, EditOutcome};
pub use slug::slugify;
pub use version::PlanVersion;
