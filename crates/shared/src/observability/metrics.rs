//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use std::net::SocketAddr;

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// Metrics 资源守卫，drop 时停止指标 HTTP 服务
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 和 `/health`。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

fn register_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "orders_processed_total",
        "Total number of order messages handled by the worker"
    );
    metrics::describe_histogram!(
        "order_processing_duration_seconds",
        "Time from receiving an order message to its final outcome"
    );
    metrics::describe_counter!(
        "orders_dead_lettered_total",
        "Total number of order messages routed to the dead-letter topic"
    );
    metrics::describe_gauge!("orders_persisted_count", "Number of rows in the orders table");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "指标服务已监听");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "指标服务异常退出");
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一条订单消息的最终结果
///
/// status 取值：acknowledged / acknowledge_failed / dead_lettered
#[inline]
pub fn record_order_processed(status: &'static str, duration_secs: f64) {
    metrics::counter!("orders_processed_total", "status" => status).increment(1);
    metrics::histogram!("order_processing_duration_seconds", "status" => status)
        .record(duration_secs);
}

/// 记录死信
///
/// reason 取值：decode / validation / persistence
#[inline]
pub fn record_dead_letter(reason: &'static str) {
    metrics::counter!("orders_dead_lettered_total", "reason" => reason).increment(1);
}

/// 更新已持久化订单数
#[inline]
pub fn set_persisted_orders(count: i64) {
    metrics::gauge!("orders_persisted_count").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未安装 recorder 时这些调用是空操作
        record_http_request("GET", "/order", 200, 0.1);
        record_order_processed("acknowledged", 0.02);
        record_dead_letter("validation");
        set_persisted_orders(3);
    }
}
