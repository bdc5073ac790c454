//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer/Consumer 抽象，
//! 统一消息头、错误映射、手动确认和优雅关闭语义。
//!
//! 路由模型：`exchange` 作为主题前缀，路由键 `k` 投递到主题 `{exchange}.{k}`，
//! 队列名即消费者组名。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::RentalError;

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// 消息拓扑：主题前缀、路由键与消费者组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub routing_key: String,
    pub dead_letter_routing_key: String,
    pub queue: String,
    pub dead_letter_queue: String,
}

impl Topology {
    pub fn from_config(config: &KafkaConfig) -> Self {
        Self {
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
            dead_letter_routing_key: config.dead_letter_routing_key.clone(),
            queue: config.queue.clone(),
            dead_letter_queue: config.dead_letter_queue.clone(),
        }
    }

    /// 路由键对应的主题名
    pub fn topic_for(&self, routing_key: &str) -> String {
        format!("{}.{}", self.exchange, routing_key)
    }

    pub fn main_topic(&self) -> String {
        self.topic_for(&self.routing_key)
    }

    pub fn dead_letter_topic(&self) -> String {
        self.topic_for(&self.dead_letter_routing_key)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::from_config(&KafkaConfig::default())
    }
}

/// 声明主题拓扑，已存在的主题视为成功
pub async fn declare_topology(config: &KafkaConfig, topology: &Topology) -> Result<(), RentalError> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .create()
        .map_err(|e| RentalError::Kafka(format!("创建 AdminClient 失败: {e}")))?;

    let main_topic = topology.main_topic();
    let dead_letter_topic = topology.dead_letter_topic();
    let topics = [
        NewTopic::new(
            &main_topic,
            config.partitions,
            TopicReplication::Fixed(config.replication_factor),
        ),
        NewTopic::new(
            &dead_letter_topic,
            config.partitions,
            TopicReplication::Fixed(config.replication_factor),
        ),
    ];

    let results = admin
        .create_topics(&topics, &AdminOptions::new())
        .await
        .map_err(|e| RentalError::Kafka(format!("声明主题失败: {e}")))?;

    for result in results {
        match result {
            Ok(topic) => info!(topic, "主题已创建"),
            Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic, "主题已存在")
            }
            Err((topic, code)) => {
                return Err(RentalError::Kafka(format!("创建主题 {topic} 失败: {code}")));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// 出站消息与发送抽象
// ---------------------------------------------------------------------------

/// 待发送的消息
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl OutboundMessage {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 消息发送端
///
/// 生产环境由 [`KafkaProducer`] 实现，测试中替换为内存实现。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), RentalError>;
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage` 转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone, Default)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for header in h.iter() {
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp: msg.timestamp().to_millis(),
            headers,
        }
    }

    /// 由出站消息构造（进程内投递与测试使用）
    pub fn from_outbound(message: &OutboundMessage, partition: i32, offset: i64) -> Self {
        Self {
            topic: message.topic.clone(),
            partition,
            offset,
            key: Some(message.key.clone()),
            payload: message.payload.clone(),
            timestamp: None,
            headers: message.headers.iter().cloned().collect(),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// 将负载按 UTF-8 转为字符串，非法字节以替换字符表示
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, RentalError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// `acks=all` 保证消息在 Broker 端持久化后才视为发送成功。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, RentalError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("acks", "all")
            .create()
            .map_err(|e| RentalError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    /// 发送消息，返回 (partition, offset)
    pub async fn send_message(&self, message: &OutboundMessage) -> Result<(i32, i64), RentalError> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for (key, value) in &message.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }

        let record = FutureRecord::to(&message.topic)
            .key(message.key.as_str())
            .payload(message.payload.as_slice())
            .headers(headers);

        let delivery = self
            .producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(e, _)| RentalError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic = %message.topic,
            key = %message.key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }
}

#[async_trait]
impl MessageSink for KafkaProducer {
    async fn send(&self, message: OutboundMessage) -> Result<(), RentalError> {
        self.send_message(&message).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 消息处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// 处理完成，提交位点
    Ack,
    /// 放弃该消息且不重新投递，提交位点
    Reject,
    /// 不提交位点，停止消费，消息在下次启动时重新投递
    Release,
}

/// 面向业务的 Kafka 消费者
///
/// 关闭自动提交，由处理结果决定何时提交位点。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    group_id: String,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig, group_id: &str) -> Result<Self, RentalError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| RentalError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
        Ok(Self {
            consumer,
            group_id: group_id.to_string(),
        })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<(), RentalError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| RentalError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, group_id = %self.group_id, "已订阅 Kafka topics");
        Ok(())
    }

    fn commit(&self, msg: &ConsumerMessage) {
        let mut tpl = TopicPartitionList::new();
        if let Err(e) =
            tpl.add_partition_offset(&msg.topic, msg.partition, Offset::Offset(msg.offset + 1))
        {
            error!(error = %e, "构造提交位点失败");
            return;
        }
        if let Err(e) = self.consumer.commit(&tpl, CommitMode::Async) {
            error!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "提交位点失败"
            );
        }
    }

    /// 启动消费循环
    ///
    /// 消息逐条顺序处理，handler 返回后根据 [`Acknowledgement`] 提交或保留位点。
    /// 关闭信号变为 `true` 时退出循环，正在执行的 handler 自然完成。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Acknowledgement>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!(group_id = %self.group_id, "Kafka 消费循环已启动");

        loop {
            let msg = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                    continue;
                }

                msg_result = stream.next() => {
                    match msg_result {
                        Some(Ok(borrowed_msg)) => ConsumerMessage::from_borrowed(&borrowed_msg),
                        Some(Err(e)) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                            continue;
                        }
                        None => {
                            warn!("Kafka 消息流意外结束");
                            break;
                        }
                    }
                }
            };

            debug!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                "收到 Kafka 消息"
            );

            match handler(msg.clone()).await {
                Acknowledgement::Ack => self.commit(&msg),
                Acknowledgement::Reject => {
                    warn!(
                        topic = %msg.topic,
                        offset = msg.offset,
                        "消息被拒绝，不再重新投递"
                    );
                    self.commit(&msg);
                }
                Acknowledgement::Release => {
                    // 后续位点的提交会隐式确认本条消息，因此这里必须停止消费
                    info!(
                        topic = %msg.topic,
                        offset = msg.offset,
                        "消息未确认，停止消费等待重新投递"
                    );
                    break;
                }
            }
        }
    }
}
