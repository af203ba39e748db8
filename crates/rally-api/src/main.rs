//! Axum API server binary with the embedded analysis worker pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rally_api::{create_router, metrics, ApiConfig, AppState};
use rally_media::{FfmpegConverter, ModelContext, ModelPaths, PipelineConfig};
use rally_queue::{JobStore, WorkQueue};
use rally_worker::{
    CatalogRecommender, CourseRecommender, JobExecutor, JobOrchestrator, OutputSweeper,
    ProcessingContext, WorkerConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env();
    init_tracing(&config);

    info!("Starting rally-api");

    if let Err(e) = run(config).await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Colored output for dev, JSON when `LOG_FORMAT=json` or in production.
fn init_tracing(config: &ApiConfig) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false)
        || config.is_production();

    let env_filter = EnvFilter::from_default_env()
        .add_directive("rally=info".parse().expect("valid directive"))
        .add_directive("ort=warn".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(config: ApiConfig) -> anyhow::Result<()> {
    let worker_config = WorkerConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    info!(
        "API config: host={}, port={}, workers={}",
        config.host, config.port, worker_config.max_concurrent_jobs
    );

    worker_config
        .ensure_dirs()
        .await
        .context("creating upload/output directories")?;

    if let Err(e) = rally_media::check_ffmpeg() {
        warn!("FFmpeg is not available, analysis jobs will fail: {}", e);
    }

    let models = Arc::new(ModelContext::load(&ModelPaths::from_env(), &pipeline));
    let recommender: Arc<dyn CourseRecommender> = match &worker_config.course_catalog_path {
        Some(path) => Arc::new(
            CatalogRecommender::from_file(path)
                .await
                .with_context(|| format!("loading course catalog {}", path.display()))?,
        ),
        None => Arc::new(CatalogRecommender::default()),
    };

    let executor = Arc::new(JobExecutor::new(worker_config.clone()));
    let store = JobStore::new();
    let (queue, receiver) = WorkQueue::bounded(worker_config.queue_capacity);
    let converter = FfmpegConverter::new().with_timeout(worker_config.job_timeout);
    let ctx = Arc::new(ProcessingContext::new(
        worker_config.clone(),
        pipeline,
        Arc::clone(&models),
        store.clone(),
        Arc::new(converter),
        recommender,
    ));

    let executor_task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver, ctx).await })
    };

    let sweeper = OutputSweeper::new(&worker_config);
    if sweeper.is_enabled() {
        tokio::spawn(sweeper.run(executor.shutdown_signal()));
    }

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("installing Prometheus recorder")?)
    } else {
        None
    };

    let orchestrator = JobOrchestrator::new(store, queue, worker_config);
    let state = AppState::new(config.clone(), orchestrator, models);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    executor.shutdown();
    if let Err(e) = executor_task.await {
        warn!("Executor task ended abnormally: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
