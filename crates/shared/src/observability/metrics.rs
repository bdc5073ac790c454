//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 与 `/health` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册预定义的业务指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "rental_returns_total",
        "Total number of processed rental returns by kind"
    );
    metrics::describe_counter!(
        "events_published_total",
        "Total number of domain events published"
    );
    metrics::describe_counter!(
        "events_consumed_total",
        "Total number of consumed events by outcome"
    );
    metrics::describe_counter!(
        "dead_letters_total",
        "Total number of messages routed to the dead-letter topic"
    );
    metrics::describe_counter!(
        "retry_attempts_total",
        "Total number of failed attempts that were eligible for retry"
    );
    metrics::describe_histogram!(
        "event_processing_duration_seconds",
        "Time spent processing a single consumed event"
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

/// 记录一次租赁归还（kind: early / on_time / late）
#[inline]
pub fn record_rental_return(kind: &str) {
    metrics::counter!("rental_returns_total", "kind" => kind.to_string()).increment(1);
}

/// 记录事件发布
#[inline]
pub fn record_event_published(event_type: &str) {
    metrics::counter!("events_published_total", "type" => event_type.to_string()).increment(1);
}

/// 记录事件消费结果（outcome: persisted / filtered / dead_lettered / rejected / released）
#[inline]
pub fn record_event_consumed(outcome: &str, duration_secs: f64) {
    metrics::counter!("events_consumed_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("event_processing_duration_seconds").record(duration_secs);
}

/// 记录死信
#[inline]
pub fn record_dead_letter(routing_key: &str) {
    metrics::counter!("dead_letters_total", "routing_key" => routing_key.to_string()).increment(1);
}

/// 记录一次可重试的失败尝试
#[inline]
pub fn record_retry_attempt(operation: &str) {
    metrics::counter!("retry_attempts_total", "operation" => operation.to_string()).increment(1);
}
