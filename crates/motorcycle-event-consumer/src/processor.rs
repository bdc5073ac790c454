//! 车辆事件处理器
//!
//! 流程：反序列化 -> 年份过滤 -> 写入投影（提交） -> 标记已处理（再次提交）。
//! 两次提交不在同一事务内，第二次失败时会留下未标记的记录，
//! 可通过 `list_unprocessed` 查出。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use rental_shared::events::MotorcycleCreatedEvent;
use rental_shared::kafka::ConsumerMessage;
use rental_shared::persistence::UnitOfWork;

use crate::error::ConsumerError;
use crate::filter::EventFilter;
use crate::models::MotorcycleEvent;
use crate::repository::MotorcycleEventRepositoryTrait;

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 已写入投影
    Persisted { record_id: Uuid },
    /// 被过滤，不写入
    Filtered { year: i32 },
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persisted { .. } => "persisted",
            Self::Filtered { .. } => "filtered",
        }
    }
}

pub struct MotorcycleEventProcessor<R> {
    repository: Arc<R>,
    filter: EventFilter,
}

impl<R: MotorcycleEventRepositoryTrait> MotorcycleEventProcessor<R> {
    pub fn new(repository: Arc<R>, filter: EventFilter) -> Self {
        Self { repository, filter }
    }

    pub async fn process(&self, msg: &ConsumerMessage) -> Result<ProcessOutcome, ConsumerError> {
        let event: MotorcycleCreatedEvent = msg
            .deserialize_payload()
            .map_err(|e| ConsumerError::InvalidPayload(e.to_string()))?;

        if !self.filter.accepts(&event) {
            info!(
                event_id = %event.id,
                motorcycle_id = %event.motorcycle_id,
                year = event.year,
                "事件不满足过滤条件，跳过"
            );
            return Ok(ProcessOutcome::Filtered { year: event.year });
        }

        let mut record = MotorcycleEvent::from_created(&event)?;
        let uow = self.repository.unit_of_work();

        uow.add(record.clone());
        uow.commit().await?;
        debug!(record_id = %record.meta.id, "车辆事件已写入");

        record.mark_processed(Utc::now());
        uow.update(record.clone());
        uow.commit().await?;

        info!(
            event_id = %event.id,
            record_id = %record.meta.id,
            motorcycle_id = %event.motorcycle_id,
            "车辆事件处理完成"
        );
        Ok(ProcessOutcome::Persisted {
            record_id: record.meta.id,
        })
    }
}
