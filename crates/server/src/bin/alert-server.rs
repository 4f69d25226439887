//! alert-server — HTTP control plane plus ingest worker for the log
//! alerting engine. Bootstrap follows `rules-worker.rs`/`notify-worker.rs`:
//! clap CLI, `tracing_subscriber` init, a `tokio::sync::Notify`-based
//! cancellation handle, graceful shutdown on SIGINT — adapted from the
//! Eisenbahn pub-sub bootstrap to a plain axum `serve()` plus a spawned
//! ingest-worker task.

#[path = "../alert_api/mod.rs"]
mod alert_api;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use stupid_alert_engine::{Config, Engine};
use stupid_alert_store::{InMemoryStore, RedisStore};
use stupid_core::store::Store;
use stupid_notify::{AlertDispatcher, AlertNotifier, ChatWebhookNotifier, NoopAlertNotifier, SeverityPresentation};
use stupid_queue::{Context, IngestBridge, IngestBridgeConfig, InMemoryLogSource, LogSource};

use alert_api::AlertAppState;

/// HTTP control plane and ingest worker for the log alerting engine.
#[derive(Parser, Debug)]
#[command(name = "alert-server", version, about)]
struct Cli {
    /// `memory` or `redis`.
    #[arg(long, env = "ALERT_STORE_BACKEND", default_value = "memory")]
    store_backend: String,

    /// `memory` or (with the `bus-redis` feature) `redis`.
    #[arg(long, env = "ALERT_BUS_BACKEND", default_value = "memory")]
    bus_backend: String,
}

async fn build_store(cli: &Cli, config: &Config) -> Arc<dyn Store> {
    match cli.store_backend.as_str() {
        "redis" => match RedisStore::connect(&config.store.redis_url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(error = %e, "failed to connect to redis store, falling back to in-memory");
                Arc::new(InMemoryStore::new())
            }
        },
        other => {
            if other != "memory" {
                warn!(backend = other, "unknown store backend, defaulting to in-memory");
            }
            Arc::new(InMemoryStore::new())
        }
    }
}

fn build_notifier(config: &Config) -> Arc<dyn AlertNotifier> {
    if config.notify.webhook_url_template.is_empty() {
        warn!("no webhook url configured, alerts will not be delivered anywhere");
        return Arc::new(NoopAlertNotifier);
    }
    match ChatWebhookNotifier::with_timeout(
        &config.notify.webhook_url_template,
        &config.notify.default_channel,
        &config.notify.username,
        &config.notify.icon_emoji,
        config.notify.send_timeout,
        Arc::new(SeverityPresentation::default()),
    ) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            error!(error = %e, "failed to configure webhook notifier, falling back to noop");
            Arc::new(NoopAlertNotifier)
        }
    }
}

#[cfg(feature = "bus-redis")]
async fn build_log_source(cli: &Cli, config: &Config) -> Arc<dyn LogSource> {
    if cli.bus_backend == "redis" {
        match stupid_queue::log_source::redis_stream::RedisStreamSource::connect(
            &config.bus.redis_url,
            &config.bus.stream_key,
            &config.bus.consumer_group,
            &config.bus.consumer_name,
        )
        .await
        {
            Ok(source) => return Arc::new(source),
            Err(e) => error!(error = %e, "failed to connect to redis stream, falling back to in-memory source"),
        }
    }
    Arc::new(InMemoryLogSource::new().0)
}

#[cfg(not(feature = "bus-redis"))]
async fn build_log_source(_cli: &Cli, _config: &Config) -> Arc<dyn LogSource> {
    Arc::new(InMemoryLogSource::new().0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    stupid_core::config::load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let store = build_store(&cli, &config).await;
    let notifier = build_notifier(&config);
    let dispatcher = AlertDispatcher::new(notifier);

    let (engine, load_error) = Engine::new(store.clone(), dispatcher).await;
    if let Some(e) = load_error {
        warn!(error = %e, "engine started with a degraded rule set");
    }
    let engine = Arc::new(engine);

    let source = build_log_source(&cli, &config).await;
    let bridge_config = IngestBridgeConfig {
        max_retry_attempts: config.ingest.max_retry_attempts,
        initial_backoff: config.ingest.initial_backoff,
        error_rate_threshold: config.ingest.error_rate_threshold,
        staleness_window: config.ingest.staleness_window,
        batch_size: config.ingest.batch_size,
        batch_flush_interval: config.ingest.batch_flush_interval,
        parallel_group_size: config.ingest.parallel_group_size,
    };
    let bridge = Arc::new(IngestBridge::new(source, engine.clone(), bridge_config));
    let ingest_ctx = Context::new();

    let ingest_task = {
        let bridge = bridge.clone();
        let ctx = ingest_ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.process_logs(&ctx).await {
                warn!(error = %e, "ingest loop exited");
            }
        })
    };

    let state = Arc::new(AlertAppState { engine: engine.clone(), store: store.clone() });
    let app = alert_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.http.bind_address).await?;
    info!(address = %config.http.bind_address, "alert-server listening");

    let shutdown_ctx = ingest_ctx.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;

    shutdown_ctx.cancel();
    engine.stop();
    let _ = ingest_task.await;

    serve_result?;
    info!("alert-server exited cleanly");
    Ok(())
}
