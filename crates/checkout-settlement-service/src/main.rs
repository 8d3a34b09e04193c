//! 结算服务入口
//!
//! 装配四个下游客户端、结算编排器与后台对账任务，暴露 REST API。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use membership::TierSchedule;
use storefront_shared::config::AppConfig;
use storefront_shared::observability;
use storefront_shared::retry::RetryPolicy;

use checkout_settlement_service::api::{self, AppState};
use checkout_settlement_service::clients::{
    CartStore, CatalogService, HttpCartClient, HttpCatalogClient, HttpLedgerClient,
    HttpOrderClient, MembershipLedger, OrderService, build_http_client,
};
use checkout_settlement_service::orchestrator::CheckoutOrchestrator;
use checkout_settlement_service::reconciler::{Reconciler, ResidualQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 统一加载配置：config/default.toml + 环境覆盖 + STOREFRONT_ 环境变量
    let config = AppConfig::load("checkout-settlement-service").unwrap_or_else(|e| {
        tracing::warn!("配置加载失败，使用默认配置: {}", e);
        AppConfig::default()
    });

    // 2. 初始化可观测性（tracing + Prometheus 指标）
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("启动 checkout-settlement-service...");
    info!(environment = %config.environment, "配置加载完成");

    // 3. 构建下游客户端（共享同一个带连接池的 HTTP Client）
    let http = build_http_client(Duration::from_secs(config.services.request_timeout_seconds))?;
    let catalog: Arc<dyn CatalogService> = Arc::new(HttpCatalogClient::new(
        config.services.catalog_url.clone(),
        http.clone(),
    ));
    let orders: Arc<dyn OrderService> = Arc::new(HttpOrderClient::new(
        config.services.order_url.clone(),
        http.clone(),
    ));
    let ledger: Arc<dyn MembershipLedger> = Arc::new(HttpLedgerClient::new(
        config.services.membership_url.clone(),
        http.clone(),
    ));
    let cart: Arc<dyn CartStore> = Arc::new(HttpCartClient::new(
        config.services.cart_url.clone(),
        http,
    ));
    info!(
        catalog = %config.services.catalog_url,
        order = %config.services.order_url,
        membership = %config.services.membership_url,
        cart = %config.services.cart_url,
        "下游客户端就绪"
    );

    // 4. 等级门槛表（配置注入，构造时校验次序）
    let tiers = TierSchedule::new(
        config.membership.silver_threshold,
        config.membership.gold_threshold,
    )?;

    // 5. 残留队列与后台对账任务
    let residuals = Arc::new(ResidualQueue::new());
    let reconciler = Reconciler::new(
        residuals.clone(),
        ledger.clone(),
        cart.clone(),
        RetryPolicy::default(),
        Duration::from_secs(config.reconciler.interval_seconds),
        config.reconciler.max_retries,
    );
    let reconciler_handle = reconciler.spawn();
    info!("后台对账任务已启动");

    // 6. 结算编排器与路由
    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        catalog.clone(),
        orders.clone(),
        ledger.clone(),
        cart.clone(),
        tiers.clone(),
        residuals,
    ));

    let app = api::router(AppState {
        orchestrator,
        catalog,
        orders,
        ledger,
        cart,
        tiers,
    })
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .layer(TimeoutLayer::new(Duration::from_secs(30)));

    // 7. 启动 HTTP 服务
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP 服务监听 {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reconciler_handle.abort();
    info!("服务已关闭");
    Ok(())
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号，用于 Kubernetes 优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
        _ = terminate => {
            info!("收到 SIGTERM，开始优雅关闭...");
        }
    }
}
