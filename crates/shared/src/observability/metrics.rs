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

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出，并在 `port` 上暴露 `/metrics` 与 `/health`
pub async fn init(service_name: &str, port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "npc_shop_transactions_total",
        "Total number of shop transactions by operation and outcome"
    );
    metrics::describe_counter!(
        "npc_shop_consumable_cache_loads_total",
        "Total number of rechargeable catalog loads on cache miss"
    );

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
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次商店交易（operation: enter/exit/buy/sell/recharge）
#[inline]
pub fn record_shop_transaction(operation: &'static str, outcome: &str) {
    metrics::counter!(
        "npc_shop_transactions_total",
        "operation" => operation,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次可充值目录加载
#[inline]
pub fn record_consumable_cache_load(success: bool) {
    metrics::counter!(
        "npc_shop_consumable_cache_loads_total",
        "result" => if success { "ok" } else { "error" }
    )
    .increment(1);
}
