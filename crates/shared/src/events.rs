//! 领域事件模型
//!
//! 所有对外发布的事件都实现 [`DomainEvent`]，提供唯一 ID、发生时间和类型名，
//! 发布器据此生成消息头。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 领域事件
pub trait DomainEvent: Serialize + Send + Sync {
    /// 事件唯一标识，同时作为消息 ID
    fn event_id(&self) -> Uuid;

    fn occurred_at(&self) -> DateTime<Utc>;

    /// 事件类型名，写入 `type` 消息头
    fn event_type(&self) -> &'static str;
}

/// 车辆登记事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotorcycleCreatedEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub motorcycle_id: Uuid,
    pub identifier: String,
    pub year: i32,
    pub model: String,
    pub plate: String,
}

impl MotorcycleCreatedEvent {
    pub const TYPE_NAME: &'static str = "MotorcycleCreatedEvent";

    pub fn new(
        motorcycle_id: Uuid,
        identifier: impl Into<String>,
        year: i32,
        model: impl Into<String>,
        plate: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            motorcycle_id,
            identifier: identifier.into(),
            year,
            model: model.into(),
            plate: plate.into(),
        }
    }
}

impl DomainEvent for MotorcycleCreatedEvent {
    fn event_id(&self) -> Uuid {
        self.id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn event_type(&self) -> &'static str {
        Self::TYPE_NAME
    }
}
