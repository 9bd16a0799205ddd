//! My-ERP-Plan API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and organization role checks
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRef},
    http::Request,
    routing::{get, post, put},
    Router,
};
use erp_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    errors::AppError,
    llm::{create_language_model, LanguageModel},
    metrics::{self, LATENCY_BUCKETS, LLM_BUCKETS, METRICS_PREFIX},
    plan::PlanGenerator,
    storage::LocalStorage,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub llm: Arc<dyn LanguageModel>,
    pub generator: PlanGenerator,
    pub jwt: Arc<JwtManager>,
    pub storage: LocalStorage,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DbPool, llm: Arc<dyn LanguageModel>) -> Result<Self, AppError> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret is required".to_string(),
            })?;

        Ok(Self {
            jwt: Arc::new(JwtManager::new(secret, config.auth.jwt_audience.clone())),
            repo: Repository::new(db.clone()),
            generator: PlanGenerator::new(llm.clone(), config.llm.generation_max_tokens),
            storage: LocalStorage::new(config.storage.root.clone()),
            config,
            db,
            llm,
        })
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);
    info!("Starting My-ERP-Plan API Gateway v{}", erp_common::VERSION);

    // Initialize metrics
    install_metrics_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    let llm = create_language_model(&config.llm)?;
    info!(model = %llm.model_name(), "Language model configured");

    let state = AppState::new(config.clone(), db, llm)?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
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

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets(LATENCY_BUCKETS)?
        .set_buckets_for_metric(
            Matcher::Prefix(format!("{}_llm", METRICS_PREFIX)),
            LLM_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_plan_generation_duration_seconds", METRICS_PREFIX)),
            LLM_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
            user_id = tracing::field::Empty,
        )
    });

    let api_routes = Router::new()
        // Organizations
        .route(
            "/organizations",
            post(handlers::organizations::create_organization)
                .get(handlers::organizations::list_organizations),
        )
        .route(
            "/organizations/{org_id}/plans",
            get(handlers::plans::list_plans),
        )
        .route(
            "/organizations/{org_id}/plans/generate",
            post(handlers::plans::generate_plan),
        )
        .route(
            "/organizations/{org_id}/documents",
            post(handlers::documents::upload_document).get(handlers::documents::list_documents),
        )
        // Plans
        .route("/plans/{id}", get(handlers::plans::get_plan))
        .route("/plans/{id}/sections", put(handlers::plans::update_sections))
        .route("/plans/{id}/status", post(handlers::plans::set_status))
        .route("/plans/{id}/activate", post(handlers::plans::activate_plan))
        .route("/plans/{id}/versions", post(handlers::plans::create_version))
        .route("/plans/{id}/refresh", post(handlers::plans::refresh_plan))
        .route("/plans/{id}/chat", post(handlers::chat::chat_edit))
        .route("/plans/{id}/export", get(handlers::exports::export_plan))
        .route("/plans/{id}/extractions", get(handlers::plans::list_extractions))
        // Documents
        .route("/documents/{id}", get(handlers::documents::get_document))
        .route("/documents/{id}/apply", post(handlers::documents::apply_document));

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v2", api_routes)
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    if config.rate_limit.enabled {
        let limiter = create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));
    }

    app.layer(TimeoutLayer::new(config.request_timeout()))
        .layer(trace)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
