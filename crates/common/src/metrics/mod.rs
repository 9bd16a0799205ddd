//! Metrics and observability utilities
//!
//! Prometheus metrics for requests, model calls, plan generation, chat edits,
//! document extraction and exports.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

use crate::plan::TokenUsage;

/// Metrics prefix for all My-ERP-Plan metrics
pub const METRICS_PREFIX: &str = "erp";

/// Histogram buckets for API request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for model calls, which take tens of seconds for full plans
pub const LLM_BUCKETS: &[f64] = &[
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 1m
    120.0, // 2m
    180.0, // 3m
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total language model calls, including retries"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language model call latency in seconds"
    );

    describe_counter!(
        format!("{}_llm_tokens_total", METRICS_PREFIX),
        Unit::Count,
        "Tokens consumed by language model calls"
    );

    describe_counter!(
        format!("{}_plans_generated_total", METRICS_PREFIX),
        Unit::Count,
        "Total plan generations"
    );

    describe_histogram!(
        format!("{}_plan_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Plan generation latency in seconds"
    );

    describe_gauge!(
        format!("{}_plan_confidence", METRICS_PREFIX),
        Unit::Count,
        "Confidence score of the last generated plan"
    );

    describe_counter!(
        format!("{}_chat_edits_total", METRICS_PREFIX),
        Unit::Count,
        "Chat edit requests by outcome"
    );

    describe_counter!(
        format!("{}_documents_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Documents processed by the extraction worker"
    );

    describe_histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document extraction latency in seconds"
    );

    describe_counter!(
        format!("{}_exports_total", METRICS_PREFIX),
        Unit::Count,
        "PDF exports by kind"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// One model call, after retries
pub fn record_llm_request(model: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

pub fn record_llm_tokens(model: &str, usage: &TokenUsage) {
    counter!(
        format!("{}_llm_tokens_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "direction" => "input"
    )
    .increment(usage.input_tokens as u64);

    counter!(
        format!("{}_llm_tokens_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "direction" => "output"
    )
    .increment(usage.output_tokens as u64);
}

pub fn record_plan_generation(success: bool, confidence: u8, duration_secs: f64) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_plans_generated_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    histogram!(format!("{}_plan_generation_duration_seconds", METRICS_PREFIX))
        .record(duration_secs);

    if success {
        gauge!(format!("{}_plan_confidence", METRICS_PREFIX)).set(confidence as f64);
    }
}

/// `outcome` is one of applied, noop, unclear
pub fn record_chat_edit(action: &str, outcome: &'static str) {
    counter!(
        format!("{}_chat_edits_total", METRICS_PREFIX),
        "action" => action.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_extraction(status: &'static str, document_type: &str, duration_secs: f64) {
    counter!(
        format!("{}_documents_processed_total", METRICS_PREFIX),
        "status" => status,
        "document_type" => document_type.to_string()
    )
    .increment(1);

    histogram!(format!("{}_extraction_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_export(kind: &'static str) {
    counter!(
        format!("{}_exports_total", METRICS_PREFIX),
        "kind" => kind
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, LLM_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops
        RequestMetrics::start("GET", "/v2/plans/{id}").finish(200);
        record_llm_request("mock-model", true, 0.5);
        record_llm_tokens("mock-model", &TokenUsage::default());
        record_plan_generation(true, 80, 12.0);
        record_chat_edit("modify_text", "applied");
        record_extraction("completed", "contact_list", 3.0);
        record_export("wallet");
    }
}
