//! INFT Hub 服务入口
//!
//! 加载配置 → 创建后端、存储、事件通道与注册表 → 启动 HTTP 服务与空闲回收任务，
//! 收到 Ctrl+C / SIGTERM 后停止接收新请求，释放所有协调器并等待在途生成落地。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use inft_hub::{
    backend::create_backend_from_config,
    config::{load_config, AppConfig},
    coordinator::{AgentRegistry, CoordinatorContext, CoordinatorSettings},
    core::{ShutdownManager, ShutdownReason},
    events::EventChannel,
    gateway::{create_router, GatewayState},
    observability,
    store::create_record_store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::var("INFT_CONFIG").ok().map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let backend = create_backend_from_config(&cfg.backend).context("Failed to create generation backend")?;
    let store = create_record_store(cfg.persistence.db_path.as_deref()).await;
    let events = Arc::new(EventChannel::new(cfg.coordinator.event_buffer));
    let context = Arc::new(CoordinatorContext::new(
        backend,
        store,
        events,
        CoordinatorSettings::from_config(&cfg),
    ));
    let registry = Arc::new(AgentRegistry::new(context));

    let shutdown = ShutdownManager::new();
    shutdown.install_signal_handlers();

    let sweeper = registry.spawn_sweeper(
        Duration::from_secs(cfg.server.sweep_interval_secs),
        Duration::from_secs(cfg.coordinator.idle_timeout_secs),
        shutdown.token(),
    );

    let app = create_router(GatewayState::new(Arc::clone(&registry), &cfg));
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind_addr))?;
    tracing::info!("INFT hub listening on http://{}", cfg.server.bind_addr);

    let signal = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.wait_for_shutdown().await })
        .await;
    if !shutdown.is_shutdown() {
        let reason = match served {
            Err(ref e) => e.to_string(),
            Ok(()) => "HTTP server stopped".to_string(),
        };
        shutdown.shutdown(ShutdownReason::Internal(reason));
    }

    let _ = sweeper.await;
    registry
        .shutdown(Duration::from_secs(cfg.server.shutdown_timeout_secs))
        .await;
    tracing::info!("Shutdown complete ({:?})", shutdown.reason());

    served.context("HTTP server failed")
}
