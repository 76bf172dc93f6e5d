//! 订单 HTTP 服务入口

use anyhow::Result;
use order_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use order_api::routes;

const SERVICE_NAME: &str = "order-api";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(environment = %config.environment, "正在启动订单 HTTP 服务...");

    let app = routes::api_routes();

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!(addr = %config.server_addr(), "HTTP 服务已监听");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("订单 HTTP 服务已关闭");
    Ok(())
}

/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "无法监听 Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 Ctrl+C，开始优雅关闭..."),
        _ = terminate => info!("收到 SIGTERM，开始优雅关闭..."),
    }
}
