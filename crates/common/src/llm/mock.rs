use super::{Completion, CompletionRequest, LanguageModel};
use crate::errors::{AppError, Result};
use crate::plan::TokenUsage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock model for testing
///
/// Returns scripted responses in order and records every request. When the
/// script runs out it answers with a fixed placeholder.
#[derive(Default)]
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::default();
        for response in responses {
            model.push_response(response);
        }
        model
    }

    pub fn push_response(&self, text: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(text.into()));
        }
    }

    pub fn push_error(&self, error: AppError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());

        let text = match next {
            Some(response) => response?,
            None => "[Mock response - LLM API key not configured]".to_string(),
        };

        Ok(Completion {
            usage: TokenUsage {
                input_tokens: (request.prompt.len() / 4) as u32,
                output_tokens: (text.len() / 4) as u32,
            },
            text,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_placeholder() {
        let model = MockLanguageModel::with_responses(["first"]);
        let request = CompletionRequest::new("hello", 10);

        assert_eq!(model.complete(&request).await.unwrap().text, "first");
        assert!(model.complete(&request).await.unwrap().text.contains("Mock"));
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let model = MockLanguageModel::new();
        model.push_error(AppError::Internal {
            message: "boom".into(),
        });
        assert!(model.complete(&CompletionRequest::new("x", 1)).await.is_err());
    }
}
