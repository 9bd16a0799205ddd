//! Ingestion worker error types

use erp_common::documents::ExtractionParseError;
use erp_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {filename}: {message}")]
    PdfParse { filename: String, message: String },

    #[error("Document {filename} contains no readable text")]
    EmptyText { filename: String },

    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Model reply could not be used: {0}")]
    Extraction(#[from] ExtractionParseError),

    #[error(transparent)]
    App(#[from] AppError),
}

impl IngestionError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestionError::App(e) => match e {
                // Transport failures are not retried in-request but the queue may try later
                AppError::Llm { retryable, status, .. } => *retryable || status.is_none(),
                AppError::Validation { .. } | AppError::UnsupportedMediaType { .. } => false,
                _ => true,
            },
            // The model may answer differently next time
            IngestionError::Extraction(_) => true,
            IngestionError::PdfParse { .. }
            | IngestionError::EmptyText { .. }
            | IngestionError::UnsupportedType(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let overloaded = IngestionError::App(AppError::Llm {
            code: "overloaded_error".into(),
            message: "busy".into(),
            status: Some(529),
            retryable: true,
        });
        assert!(overloaded.is_retryable());

        let rejected = IngestionError::App(AppError::Llm {
            code: "invalid_request_error".into(),
            message: "bad".into(),
            status: Some(400),
            retryable: false,
        });
        assert!(!rejected.is_retryable());

        let timed_out = IngestionError::App(AppError::Llm {
            code: "timeout".into(),
            message: "no answer".into(),
            status: None,
            retryable: false,
        });
        assert!(timed_out.is_retryable());

        assert!(IngestionError::App(AppError::Storage { message: "io".into() }).is_retryable());
        assert!(IngestionError::Extraction(ExtractionParseError::MissingJson).is_retryable());
        assert!(!IngestionError::EmptyText { filename: "a.txt".into() }.is_retryable());
    }
}
