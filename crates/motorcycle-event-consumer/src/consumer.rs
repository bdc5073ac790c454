//! Kafka 消费与重试
//!
//! 每条消息最多处理 `max_retry_attempts` 次，两次尝试之间按
//! `base_delay * 2^(attempt-1)` 退避。次数耗尽后发送到死信队列：
//! 发送成功则确认原消息，发送失败则拒绝原消息（不再投递）。
//! 退避期间收到关闭信号时放弃该消息且不提交位点。

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{error, info, warn};

use rental_shared::config::ConsumerConfig;
use rental_shared::dlq::{DeadLetterMessage, DlqProducer};
use rental_shared::kafka::{Acknowledgement, ConsumerMessage, KafkaConsumer, MessageSink, Topology};
use rental_shared::observability::metrics;
use rental_shared::publisher::headers;
use rental_shared::retry::{RetryPolicy, wait_for_shutdown};

use crate::error::ConsumerError;
use crate::processor::MotorcycleEventProcessor;
use crate::repository::MotorcycleEventRepositoryTrait;

const OPERATION: &str = "motorcycle_event.process";

pub struct MotorcycleEventConsumer<R, S> {
    processor: MotorcycleEventProcessor<R>,
    dlq: DlqProducer<S>,
    policy: RetryPolicy,
}

impl<R, S> MotorcycleEventConsumer<R, S>
where
    R: MotorcycleEventRepositoryTrait,
    S: MessageSink,
{
    pub fn new(
        processor: MotorcycleEventProcessor<R>,
        dlq: DlqProducer<S>,
        config: &ConsumerConfig,
    ) -> Self {
        Self {
            processor,
            dlq,
            policy: RetryPolicy::exponential(
                config.max_retry_attempts,
                Duration::from_millis(config.base_delay_ms),
            ),
        }
    }

    /// 订阅主题并顺序消费，直到收到关闭信号
    pub async fn run(
        self,
        consumer: KafkaConsumer,
        topology: &Topology,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConsumerError> {
        let topic = topology.main_topic();
        consumer.subscribe(&[topic.as_str()])?;
        info!(topic = %topic, group_id = %topology.queue, "车辆事件消费者已启动");

        let this = &self;
        let handler_shutdown = shutdown.clone();
        consumer
            .start(shutdown, move |msg| {
                let mut shutdown = handler_shutdown.clone();
                async move { this.handle_delivery(&msg, &mut shutdown).await }
            })
            .await;

        info!("车辆事件消费者已停止");
        Ok(())
    }

    /// 处理一条投递，返回位点处理方式
    pub async fn handle_delivery(
        &self,
        msg: &ConsumerMessage,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Acknowledgement {
        let started = Instant::now();
        let message_id = msg
            .header(headers::MESSAGE_ID)
            .or(msg.key.as_deref())
            .unwrap_or("unknown")
            .to_string();

        let mut attempt: u32 = 1;
        loop {
            let err = match self.processor.process(msg).await {
                Ok(outcome) => {
                    metrics::record_event_consumed(outcome.as_str(), started.elapsed().as_secs_f64());
                    return Acknowledgement::Ack;
                }
                Err(e) => e,
            };

            warn!(
                message_id = %message_id,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %err,
                "车辆事件处理失败"
            );

            if !self.policy.has_attempts_left(attempt) {
                return self.dead_letter(msg, &message_id, &err, attempt, started).await;
            }

            let delay = self.policy.delay_for_attempt(attempt);
            tokio::select! {
                biased;

                _ = wait_for_shutdown(shutdown) => {
                    info!(message_id = %message_id, attempt, "退避期间收到关闭信号，消息将重新投递");
                    metrics::record_event_consumed("released", started.elapsed().as_secs_f64());
                    return Acknowledgement::Release;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            metrics::record_retry_attempt(OPERATION);
            attempt += 1;
        }
    }

    async fn dead_letter(
        &self,
        msg: &ConsumerMessage,
        message_id: &str,
        err: &ConsumerError,
        attempts: u32,
        started: Instant,
    ) -> Acknowledgement {
        let dead_letter = DeadLetterMessage::new(msg.payload_lossy(), err.to_string(), attempts);

        match self.dlq.send_to_dlq(message_id, &dead_letter).await {
            Ok(()) => {
                metrics::record_event_consumed("dead_lettered", started.elapsed().as_secs_f64());
                Acknowledgement::Ack
            }
            Err(e) => {
                error!(
                    message_id,
                    error = %e,
                    original_error = %err,
                    "发送死信失败，消息将被丢弃"
                );
                metrics::record_event_consumed("rejected", started.elapsed().as_secs_f64());
                Acknowledgement::Reject
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rental_shared::events::MotorcycleCreatedEvent;
    use rental_shared::test_utils::{InMemoryTable, RecordingSink};
    use uuid::Uuid;

    use crate::filter::EventFilter;
    use crate::models::MotorcycleEvent;
    use crate::repository::MockMotorcycleEventRepositoryTrait;

    fn consumer(
        table: &InMemoryTable<MotorcycleEvent>,
        sink: RecordingSink,
    ) -> MotorcycleEventConsumer<MockMotorcycleEventRepositoryTrait, RecordingSink> {
        let mut repo = MockMotorcycleEventRepositoryTrait::new();
        let table = table.clone();
        repo.expect_unit_of_work()
            .returning(move || Box::new(table.unit_of_work()));

        MotorcycleEventConsumer::new(
            MotorcycleEventProcessor::new(Arc::new(repo), EventFilter::Year(2024)),
            DlqProducer::new(sink, Topology::default()),
            &ConsumerConfig::default(),
        )
    }

    fn message(year: i32) -> ConsumerMessage {
        let event = MotorcycleCreatedEvent::new(Uuid::new_v4(), "moto-1", year, "Titan", "ABC1D23");
        ConsumerMessage {
            key: Some(event.id.to_string()),
            payload: serde_json::to_vec(&event).unwrap(),
            ..ConsumerMessage::default()
        }
    }

    #[tokio::test]
    async fn test_success_is_acknowledged() {
        let table = InMemoryTable::new();
        let sink = RecordingSink::new();
        let c = consumer(&table, sink.clone());
        let (_tx, mut rx) = watch::channel(false);

        assert_eq!(c.handle_delivery(&message(2024), &mut rx).await, Acknowledgement::Ack);
        assert_eq!(table.len(), 1);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers_on_retry() {
        let table = InMemoryTable::new();
        table.fail_next_commits(1);
        let sink = RecordingSink::new();
        let c = consumer(&table, sink.clone());
        let (_tx, mut rx) = watch::channel(false);

        let started = tokio::time::Instant::now();
        assert_eq!(c.handle_delivery(&message(2024), &mut rx).await, Acknowledgement::Ack);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(table.len(), 1);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dlq_failure_rejects() {
        let table = InMemoryTable::new();
        let sink = RecordingSink::new();
        sink.fail_always();
        let c = consumer(&table, sink.clone());
        let (_tx, mut rx) = watch::channel(false);
        let bad = ConsumerMessage {
            payload: b"{".to_vec(),
            ..ConsumerMessage::default()
        };

        assert_eq!(c.handle_delivery(&bad, &mut rx).await, Acknowledgement::Reject);
        assert_eq!(sink.attempts(), 1);
        assert!(table.is_empty());
    }
}
