//! Document extraction processor
//!
//! Claims due documents from the `documents` table, extracts their text,
//! asks the model to classify them and pull out emergency-planning data,
//! and records the outcome. Failed attempts are rescheduled with an
//! exponential delay until the attempt budget is spent.

use crate::errors::IngestionError;
use crate::pdf::extract_text_from_pdf;
use erp_common::{
    config::ExtractionConfig,
    db::{models::Document, CompletedExtraction, Repository},
    documents::{
        build_extraction_prompt, parse_extraction_response, truncate_chars,
        EXTRACTION_SYSTEM_PROMPT,
    },
    errors::AppError,
    llm::{CompletionRequest, LanguageModel},
    metrics,
    storage::LocalStorage,
    MAX_EXTRACTED_TEXT_CHARS,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Longest delay between two attempts
const MAX_RETRY_DELAY_SECS: i64 = 3_600;

/// Delay before attempt `attempt + 1`: `base * 2^(attempt - 1)`, capped at an hour
pub fn retry_delay_secs(base_secs: i64, attempt: i32) -> i64 {
    let exponent = attempt.saturating_sub(1).clamp(0, 20) as u32;
    base_secs
        .max(1)
        .saturating_mul(2_i64.saturating_pow(exponent))
        .min(MAX_RETRY_DELAY_SECS)
}

/// Plain text of an upload according to its MIME type
pub fn document_text(mime_type: &str, bytes: &[u8], filename: &str) -> Result<String, IngestionError> {
    let base = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let text = match base.as_str() {
        "application/pdf" => extract_text_from_pdf(bytes, filename)?,
        "text/plain" | "text/markdown" | "text/csv" => {
            String::from_utf8_lossy(bytes).replace('\u{FEFF}', "")
        }
        _ => return Err(IngestionError::UnsupportedType(mime_type.to_string())),
    };

    if text.trim().is_empty() {
        return Err(IngestionError::EmptyText {
            filename: filename.to_string(),
        });
    }
    Ok(text)
}

/// Extraction worker
pub struct DocumentProcessor {
    repository: Repository,
    storage: LocalStorage,
    llm: Arc<dyn LanguageModel>,
    settings: ExtractionConfig,
    max_tokens: u32,
}

impl DocumentProcessor {
    pub fn new(
        repository: Repository,
        storage: LocalStorage,
        llm: Arc<dyn LanguageModel>,
        settings: ExtractionConfig,
        max_tokens: u32,
    ) -> Self {
        Self {
            repository,
            storage,
            llm,
            settings,
            max_tokens,
        }
    }

    /// Claim and process one due document; `false` when none was due
    pub async fn poll_once(&self) -> Result<bool, IngestionError> {
        let Some(document) = self
            .repository
            .claim_next_document(self.settings.lease_secs)
            .await?
        else {
            return Ok(false);
        };

        self.process(document).await?;
        Ok(true)
    }

    /// Run one attempt on a claimed document and record the outcome
    #[instrument(skip(self, document), fields(document_id = %document.id, attempt = document.attempt_count))]
    pub async fn process(&self, document: Document) -> Result<(), IngestionError> {
        if document.attempt_count > self.settings.max_attempts {
            // Lease expired on the last attempt without an outcome
            let message = document
                .processing_error
                .clone()
                .unwrap_or_else(|| "Extraction did not finish".to_string());
            error!(error = %message, "Attempts exhausted, marking document failed");
            self.repository.fail_document(document.id, &message).await?;
            metrics::record_extraction("failed", "unknown", 0.0);
            return Ok(());
        }

        let started = Instant::now();
        match self.extract(&document).await {
            Ok(result) => {
                let duration = started.elapsed().as_secs_f64();
                info!(
                    document_type = %result.document_type,
                    confidence = result.confidence,
                    tokens = result.usage.total(),
                    duration_ms = (duration * 1000.0) as u64,
                    "Document extracted"
                );
                metrics::record_extraction("completed", &result.document_type, duration);
                self.repository.complete_document(document.id, result).await?;
            }
            Err(e) => {
                let duration = started.elapsed().as_secs_f64();
                let message = e.to_string();

                if e.is_retryable() && document.attempt_count < self.settings.max_attempts {
                    let delay = retry_delay_secs(self.settings.retry_base_secs, document.attempt_count);
                    warn!(error = %message, delay_secs = delay, "Extraction failed, scheduling retry");
                    metrics::record_extraction("retried", "unknown", duration);
                    self.repository
                        .schedule_document_retry(document.id, &message, delay)
                        .await?;
                } else {
                    error!(error = %message, "Extraction failed permanently");
                    metrics::record_extraction("failed", "unknown", duration);
                    self.repository.fail_document(document.id, &message).await?;
                }
            }
        }

        Ok(())
    }

    /// Read the stored file and run classification and extraction
    pub async fn extract(&self, document: &Document) -> Result<CompletedExtraction, IngestionError> {
        let bytes = self.storage.get(&document.storage_path).await?;
        let text = document_text(&document.mime_type, &bytes, &document.filename)?;
        let text = truncate_chars(&text, MAX_EXTRACTED_TEXT_CHARS);

        debug!(chars = text.chars().count(), "Sending document text to model");

        let request = CompletionRequest::new(
            build_extraction_prompt(&document.filename, text),
            self.max_tokens,
        )
        .with_system(EXTRACTION_SYSTEM_PROMPT)
        .with_temperature(0.0);

        let completion = self.llm.complete(&request).await?;
        let result = parse_extraction_response(&completion.text)?;

        let mut extracted_data = serde_json::to_value(&result.data).map_err(AppError::from)?;
        if let (Some(summary), Some(map)) = (result.summary, extracted_data.as_object_mut()) {
            map.insert("summary".to_string(), summary.into());
        }

        Ok(CompletedExtraction {
            extracted_text: text.to_string(),
            extracted_data,
            document_type: result.document_type,
            confidence: result.confidence,
            usage: completion.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use erp_common::db::{models::DocumentStatus, DbPool};
    use erp_common::llm::MockLanguageModel;
    use sea_orm::DatabaseConnection;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    const CONTACT_SHEET: &str = "Name,Role,Phone\nDana Ortiz,Store Manager,206-555-0100\n";

    const EXTRACTION_REPLY: &str = r#"```json
{
  "document_type": "contact_list",
  "confidence": 0.9,
  "summary": "Staff phone list",
  "contacts": [
    {"name": "Dana Ortiz", "role": "Store Manager", "phone": "206-555-0100"},
    {"name": "", "role": "unknown"}
  ],
  "equipment": [],
  "procedures": []
}
```"#;

    fn processor(storage: LocalStorage, llm: Arc<MockLanguageModel>) -> DocumentProcessor {
        let db = DbPool {
            primary: DatabaseConnection::Disconnected,
            replica: None,
        };
        DocumentProcessor::new(
            Repository::new(db),
            storage,
            llm,
            ExtractionConfig::default(),
            4_096,
        )
    }

    fn document(storage_path: &str, mime_type: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            uploaded_by: Uuid::new_v4(),
            filename: "contacts.csv".to_string(),
            file_size: CONTACT_SHEET.len() as i64,
            mime_type: mime_type.to_string(),
            storage_path: storage_path.to_string(),
            content_hash: String::new(),
            status: DocumentStatus::Processing.into(),
            extracted_text: None,
            extracted_data: None,
            document_type: None,
            confidence_score: None,
            processing_error: None,
            attempt_count: 1,
            next_attempt_at: None,
            lease_expires_at: None,
            input_tokens: 0,
            output_tokens: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            processed_at: None,
        }
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay_secs(30, 1), 30);
        assert_eq!(retry_delay_secs(30, 2), 60);
        assert_eq!(retry_delay_secs(30, 3), 120);
        assert_eq!(retry_delay_secs(30, 40), MAX_RETRY_DELAY_SECS);
        assert_eq!(retry_delay_secs(0, 1), 1);
    }

    #[test]
    fn test_document_text_by_mime_type() {
        assert_eq!(
            document_text("text/csv; charset=utf-8", CONTACT_SHEET.as_bytes(), "a.csv").unwrap(),
            CONTACT_SHEET
        );
        assert!(matches!(
            document_text("image/png", b"\x89PNG", "a.png"),
            Err(IngestionError::UnsupportedType(_))
        ));
        assert!(matches!(
            document_text("text/plain", b"  \n ", "blank.txt"),
            Err(IngestionError::EmptyText { .. })
        ));
    }

    #[tokio::test]
    async fn test_extract_stored_document() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let doc = document("", "text/csv");
        let stored = storage
            .put(doc.organization_id, doc.id, &doc.filename, CONTACT_SHEET.as_bytes())
            .await
            .unwrap();
        let doc = Document {
            storage_path: stored.path,
            ..doc
        };

        let llm = Arc::new(MockLanguageModel::with_responses([EXTRACTION_REPLY]));
        let result = assert_ok!(processor(storage, llm.clone()).extract(&doc).await);

        assert_eq!(result.document_type, "contact_list");
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.extracted_text, CONTACT_SHEET);
        assert_eq!(result.extracted_data["contacts"].as_array().unwrap().len(), 1);
        assert_eq!(result.extracted_data["summary"], "Staff phone list");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system.as_deref(), Some(EXTRACTION_SYSTEM_PROMPT));
        assert!(requests[0].prompt.contains("Dana Ortiz"));
        assert!(requests[0].prompt.contains("contacts.csv"));
    }

    #[tokio::test]
    async fn test_long_text_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let doc = document("", "text/plain");
        let long = "a".repeat(MAX_EXTRACTED_TEXT_CHARS + 500);
        let stored = storage
            .put(doc.organization_id, doc.id, "notes.txt", long.as_bytes())
            .await
            .unwrap();
        let doc = Document {
            storage_path: stored.path,
            ..doc
        };

        let llm = Arc::new(MockLanguageModel::with_responses([EXTRACTION_REPLY]));
        let result = processor(storage, llm).extract(&doc).await.unwrap();
        assert_eq!(result.extracted_text.chars().count(), MAX_EXTRACTED_TEXT_CHARS);
    }

    #[tokio::test]
    async fn test_unusable_reply_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let doc = document("", "text/csv");
        let stored = storage
            .put(doc.organization_id, doc.id, &doc.filename, CONTACT_SHEET.as_bytes())
            .await
            .unwrap();
        let doc = Document {
            storage_path: stored.path,
            ..doc
        };

        let llm = Arc::new(MockLanguageModel::with_responses(["I could not read that file."]));
        let err = processor(storage, llm).extract(&doc).await.unwrap_err();
        assert!(matches!(err, IngestionError::Extraction(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let doc = document("org/doc/missing.csv", "text/csv");

        let llm = Arc::new(MockLanguageModel::new());
        let err = processor(storage, llm.clone()).extract(&doc).await.unwrap_err();
        assert!(matches!(err, IngestionError::App(AppError::Storage { .. })));
        assert!(llm.requests().is_empty());
    }
}
