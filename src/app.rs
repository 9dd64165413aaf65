/*
 * Responsibility
 * - Config 読み込み → tracing 初期化 → 依存生成 (factory) → Router 組み立て
 * - Middleware の適用 (request-id / trace / body limit / timeout)
 * - axum::serve() で起動, SIGINT/SIGTERM で graceful shutdown
 */
use std::{panic, process};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, LogFormat};
use crate::middleware;
use crate::services::factory;
use crate::state::{AppState, CheckSettings};

fn init_tracing(level: &str, format: LogFormat) {
    // RUST_LOG wins over LOG_LEVEL.
    // Ex:
    // RUST_LOG=info,pat_authz=debug,tower_http=debug cargo run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},tower_http=info")));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics via tracing; stderr may not be collected.
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level, config.log_format);
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        mode = ?config.exchange_mode,
        "Starting authorization service"
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let cache = factory::build_cache_client(config)
        .await
        .context("cache backend unavailable")?;
    let idp = factory::build_idp_client(config).context("invalid IdP settings")?;

    let authz = factory::build_authz_service(config, cache.clone(), idp.clone());
    let pats = factory::build_pat_service(config, idp);

    Ok(AppState::new(
        authz,
        pats,
        cache,
        CheckSettings {
            cache_ttl: config.cache_ttl,
            header_keys: config.header_keys.clone(),
            missing_credential: config.missing_credential_policy,
        },
    ))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::v1::routes(config).with_state(state);
    middleware::http::apply(router, config.request_timeout)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
