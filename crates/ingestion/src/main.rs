//! My-ERP-Plan Ingestion Worker
//!
//! Polls the documents table for uploads awaiting extraction:
//! 1. Claims one due document under a lease
//! 2. Extracts its text (PDF or plain text)
//! 3. Classifies it and extracts contacts, equipment, procedures and facility facts
//! 4. Completes it, or schedules a retry, or marks it failed

mod errors;
mod pdf;
mod processor;

use erp_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    llm::create_language_model,
    metrics::{self, LLM_BUCKETS, METRICS_PREFIX},
    storage::LocalStorage,
    VERSION,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::processor::DocumentProcessor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?);

    init_tracing(&config);
    info!("Starting My-ERP-Plan Ingestion Worker v{}", VERSION);

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
        .set_buckets_for_metric(
            Matcher::Prefix(format!("{}_llm", METRICS_PREFIX)),
            LLM_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_extraction_duration_seconds", METRICS_PREFIX)),
            LLM_BUCKETS,
        )?
        .install()?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    let llm = create_language_model(&config.llm)?;
    info!(model = %llm.model_name(), "Language model configured");

    let processor = DocumentProcessor::new(
        Repository::new(db),
        LocalStorage::new(config.storage.root.clone()),
        llm,
        config.extraction.clone(),
        config.llm.small_max_tokens,
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let idle = Duration::from_secs(config.extraction.poll_interval_secs.max(1));
    info!(
        poll_interval_secs = idle.as_secs(),
        max_attempts = config.extraction.max_attempts,
        "Ingestion worker ready"
    );

    // A document in flight is finished before shutdown is honored
    while !*shutdown_rx.borrow() {
        match processor.poll_once().await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => error!(error = %e, "Polling for documents failed"),
        }

        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = tokio::time::sleep(idle) => {}
        }
    }

    info!("Ingestion worker shutting down");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
