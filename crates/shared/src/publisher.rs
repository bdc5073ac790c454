//! 领域事件发布器
//!
//! 将事件序列化为 JSON，附加标准消息头后交给 [`MessageSink`] 发送。

use chrono::Utc;
use tracing::{error, info};

use crate::error::RentalError;
use crate::events::DomainEvent;
use crate::kafka::{MessageSink, OutboundMessage, Topology};
use crate::observability::metrics;

/// 标准消息头
pub mod headers {
    pub const MESSAGE_ID: &str = "message-id";
    /// 发布时刻的 Unix 秒
    pub const TIMESTAMP: &str = "timestamp";
    pub const TYPE: &str = "type";
    pub const CONTENT_TYPE: &str = "content-type";

    pub const JSON: &str = "application/json";
}

pub struct EventPublisher<S> {
    sink: S,
    topology: Topology,
}

impl<S: MessageSink> EventPublisher<S> {
    pub fn new(sink: S, topology: Topology) -> Self {
        Self { sink, topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// 发布事件
    ///
    /// `routing_key` 为空时使用默认路由键。发送失败会向上传播，
    /// 是否重试由调用方决定。
    pub async fn publish<E: DomainEvent>(
        &self,
        event: &E,
        routing_key: Option<&str>,
    ) -> Result<(), RentalError> {
        let payload = serde_json::to_vec(event)?;
        let routing_key = routing_key.unwrap_or(&self.topology.routing_key);
        let event_id = event.event_id().to_string();

        let message = OutboundMessage {
            topic: self.topology.topic_for(routing_key),
            key: event_id.clone(),
            payload,
            headers: vec![
                (headers::MESSAGE_ID.to_string(), event_id.clone()),
                (
                    headers::TIMESTAMP.to_string(),
                    Utc::now().timestamp().to_string(),
                ),
                (headers::TYPE.to_string(), event.event_type().to_string()),
                (headers::CONTENT_TYPE.to_string(), headers::JSON.to_string()),
            ],
        };

        if let Err(e) = self.sink.send(message).await {
            error!(
                event_id = %event_id,
                event_type = event.event_type(),
                routing_key,
                error = %e,
                "事件发布失败"
            );
            return Err(e);
        }

        metrics::record_event_published(event.event_type());
        info!(
            event_id = %event_id,
            event_type = event.event_type(),
            routing_key,
            "事件已发布"
        );
        Ok(())
    }
}
