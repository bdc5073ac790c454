//! 车辆事件消费服务
//!
//! 消费车辆登记事件并写入投影表，失败消息转入死信队列。

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use rental_shared::{
    config::AppConfig,
    database::Database,
    dlq::DlqProducer,
    kafka::{KafkaConsumer, KafkaProducer, Topology, declare_topology},
    observability,
};

use motorcycle_event_consumer::{
    consumer::MotorcycleEventConsumer, filter::EventFilter, processor::MotorcycleEventProcessor,
    repository::MotorcycleEventRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 此时 tracing 尚未初始化，回退提示直接写 stderr
    let config = AppConfig::load("motorcycle-event-consumer").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(environment = %config.environment, "Starting motorcycle-event-consumer...");

    let db = Database::open(&config.database).await?;

    let topology = Topology::from_config(&config.kafka);
    declare_topology(&config.kafka, &topology).await?;
    let dlq_producer = KafkaProducer::new(&config.kafka)?;
    let kafka_consumer = KafkaConsumer::new(&config.kafka, &topology.queue)?;

    let filter = EventFilter::from_config(&config.consumer);
    info!(?filter, "Event filter configured");

    let consumer = MotorcycleEventConsumer::new(
        MotorcycleEventProcessor::new(
            Arc::new(MotorcycleEventRepository::new(db.pool().clone())),
            filter,
        ),
        DlqProducer::new(dlq_producer, topology.clone()),
        &config.consumer,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    consumer.run(kafka_consumer, &topology, shutdown_rx).await?;

    db.close().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
