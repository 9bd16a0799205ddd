//! My-ERP-Plan Common Library
//!
//! Shared code for the My-ERP-Plan services including:
//! - Emergency response plan engine (prompting, parsing, editing, merging)
//! - LLM client abstraction with retry and throttling
//! - PDF exporters
//! - Database models and repository patterns
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod errors;
pub mod export;
pub mod llm;
pub mod metrics;
pub mod plan;
pub mod storage;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use llm::LanguageModel;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of characters kept from an uploaded document's text
pub const MAX_EXTRACTED_TEXT_CHARS: usize = 50_000;
