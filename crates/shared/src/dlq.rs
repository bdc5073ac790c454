//! 死信队列
//!
//! 消息在消费端耗尽重试后，原始内容连同失败原因被发送到死信路由键，
//! 等待人工处理。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::RentalError;
use crate::kafka::{MessageSink, OutboundMessage, Topology};
use crate::observability::metrics;
use crate::publisher::headers;

/// 死信消息信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 原始消息体
    pub original_message: String,
    /// 最后一次失败的错误描述
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
    /// 已尝试的处理次数
    pub attempts: u32,
}

impl DeadLetterMessage {
    pub const TYPE_NAME: &'static str = "DeadLetterMessage";

    pub fn new(original_message: impl Into<String>, error_message: impl Into<String>, attempts: u32) -> Self {
        Self {
            original_message: original_message.into(),
            error_message: error_message.into(),
            failed_at: Utc::now(),
            attempts,
        }
    }
}

/// DLQ 生产者
pub struct DlqProducer<S> {
    sink: S,
    topology: Topology,
}

impl<S: MessageSink> DlqProducer<S> {
    pub fn new(sink: S, topology: Topology) -> Self {
        Self { sink, topology }
    }

    /// 将失败消息发送到死信主题
    ///
    /// `source_message_id` 作为消息 key，便于按原消息检索。
    pub async fn send_to_dlq(
        &self,
        source_message_id: &str,
        message: &DeadLetterMessage,
    ) -> Result<(), RentalError> {
        let payload = serde_json::to_vec(message)?;

        let outbound = OutboundMessage {
            topic: self.topology.dead_letter_topic(),
            key: source_message_id.to_string(),
            payload,
            headers: vec![
                (headers::MESSAGE_ID.to_string(), Uuid::now_v7().to_string()),
                (
                    headers::TIMESTAMP.to_string(),
                    message.failed_at.timestamp().to_string(),
                ),
                (headers::TYPE.to_string(), DeadLetterMessage::TYPE_NAME.to_string()),
                (headers::CONTENT_TYPE.to_string(), headers::JSON.to_string()),
            ],
        };

        self.sink.send(outbound).await?;

        metrics::record_dead_letter(&self.topology.dead_letter_routing_key);
        warn!(
            source_message_id,
            attempts = message.attempts,
            error = %message.error_message,
            "消息已发送到死信队列"
        );
        Ok(())
    }
}
