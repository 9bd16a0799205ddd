use super::{Completion, CompletionRequest, LanguageModel, RateGate, RetryPolicy};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::plan::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
    gate: RateGate,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

impl AnthropicClient {
    /// Create a new client from configuration
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from(config),
            gate: RateGate::per_second(config.requests_per_second),
        })
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<Completion> {
        self.gate.acquire().await;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| AppError::Llm {
            code: "invalid_response".to_string(),
            message: format!("Failed to parse LLM response: {}", e),
            status: Some(status.as_u16()),
            retryable: false,
        })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AppError::Llm {
                code: "empty_response".to_string(),
                message: "Empty response from LLM".to_string(),
                status: Some(status.as_u16()),
                retryable: false,
            });
        }

        Ok(Completion {
            text,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::Llm {
        code: if e.is_timeout() { "timeout" } else { "network_error" }.to_string(),
        message: format!("LLM API request failed: {}", e),
        status: None,
        retryable: false,
    }
}

/// Map an error response to an `AppError::Llm`.
///
/// 429, any 5xx and the provider's `overloaded_error` are retryable.
fn classify_error(status: u16, body: &str) -> AppError {
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.kind, envelope.error.message),
        Err(_) => (format!("http_{}", status), body.chars().take(500).collect()),
    };

    let retryable = status == 429 || (500..600).contains(&status) || code == "overloaded_error";

    AppError::Llm {
        code,
        message,
        status: Some(status),
        retryable,
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let started = Instant::now();
        let result = self.retry.run(|_| self.send_once(request)).await;

        crate::metrics::record_llm_request(
            &self.model,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        if let Ok(completion) = &result {
            crate::metrics::record_llm_tokens(&self.model, &completion.usage);
            tracing::debug!(
                model = %self.model,
                input_tokens = completion.usage.input_tokens,
                output_tokens = completion.usage.output_tokens,
                "LLM completion finished"
            );
        }

        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            requests_per_second: 1000,
            ..Default::default()
        }
    }

    fn ok_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": text }],
            "usage": { "input_tokens": 12, "output_tokens": 34 }
        })
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("## Plan")))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config(server.uri()), "test-key".into()).unwrap();
        let completion = client
            .complete(&CompletionRequest::new("hi", 100).with_system("sys"))
            .await
            .unwrap();

        assert_eq!(completion.text, "## Plan");
        assert_eq!(completion.usage.total(), 46);
    }

    #[tokio::test]
    async fn test_overloaded_is_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "type": "error",
                "error": { "type": "overloaded_error", "message": "Overloaded" }
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("done")))
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config(server.uri()), "k".into()).unwrap();
        let completion = client.complete(&CompletionRequest::new("hi", 10)).await.unwrap();
        assert_eq!(completion.text, "done");
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "type": "error",
                "error": { "type": "invalid_request_error", "message": "max_tokens too large" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config(server.uri()), "k".into()).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hi", 10))
            .await
            .unwrap_err();

        match err {
            AppError::Llm { code, retryable, status, .. } => {
                assert_eq!(code, "invalid_request_error");
                assert_eq!(status, Some(400));
                assert!(!retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_gives_up_after_three_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(4)
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config(server.uri()), "k".into()).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hi", 10))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.details().unwrap()["provider_code"], "http_429");
    }

    #[tokio::test]
    async fn test_timeout_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("late"))
                    .set_delay(Duration::from_secs(3)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(server.uri());
        cfg.timeout_secs = 1;
        let client = AnthropicClient::new(&cfg, "k".into()).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hi", 10))
            .await
            .unwrap_err();

        match err {
            AppError::Llm { code, retryable, status, .. } => {
                assert_eq!(code, "timeout");
                assert_eq!(status, None);
                assert!(!retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn test_classification() {
        assert!(classify_error(500, "").is_retryable());
        assert!(classify_error(503, "oops").is_retryable());
        assert!(!classify_error(401, "").is_retryable());
        assert!(classify_error(
            200,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"x"}}"#
        )
        .is_retryable());
    }
}
