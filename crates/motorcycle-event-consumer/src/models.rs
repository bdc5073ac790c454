//! 车辆事件投影

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rental_shared::error::RentalError;
use rental_shared::events::MotorcycleCreatedEvent;
use rental_shared::persistence::{Entity, EntityMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    MotorcycleCreated,
}

/// 已消费的车辆事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorcycleEvent {
    pub meta: EntityMeta,
    pub motorcycle_id: Uuid,
    pub event_type: EventType,
    pub year: i32,
    /// 原始事件内容
    pub event_data: serde_json::Value,
    pub processed_at: Option<DateTime<Utc>>,
}

impl MotorcycleEvent {
    pub fn from_created(event: &MotorcycleCreatedEvent) -> Result<Self, RentalError> {
        Ok(Self {
            meta: EntityMeta::new(),
            motorcycle_id: event.motorcycle_id,
            event_type: EventType::MotorcycleCreated,
            year: event.year,
            event_data: serde_json::to_value(event)?,
            processed_at: None,
        })
    }

    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        self.processed_at = Some(at);
        self.meta.touch();
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

impl Entity for MotorcycleEvent {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
