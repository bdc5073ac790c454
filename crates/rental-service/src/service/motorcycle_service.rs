//! 车辆服务
//!
//! 登记车辆并发布 `MotorcycleCreatedEvent`。保存与发布分别按重试策略执行；
//! 车牌重复属于业务错误，不会重试。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, instrument};
use uuid::Uuid;

use rental_shared::kafka::MessageSink;
use rental_shared::persistence::{Entity, UnitOfWork};
use rental_shared::publisher::EventPublisher;
use rental_shared::retry::RetryPolicy;

use crate::clock::Clock;
use crate::error::{RentalError, Result};
use crate::models::Motorcycle;
use crate::repository::{MotorcycleRepositoryTrait, PLATE_EXISTS};
use crate::service::dto::{CreateMotorcycleRequest, MotorcycleView};

pub struct MotorcycleService<M, S> {
    motorcycles: Arc<M>,
    publisher: EventPublisher<S>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
}

impl<M, S> MotorcycleService<M, S>
where
    M: MotorcycleRepositoryTrait,
    S: MessageSink,
{
    pub fn new(
        motorcycles: Arc<M>,
        publisher: EventPublisher<S>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            motorcycles,
            publisher,
            retry,
            clock,
            shutdown: watch::channel(false).1,
        }
    }

    /// 关闭信号到达时放弃退避中的重试
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// 登记车辆
    #[instrument(skip(self, request), fields(plate = %request.plate))]
    pub async fn create(&self, request: CreateMotorcycleRequest) -> Result<MotorcycleView> {
        let motorcycle = Motorcycle::new(
            &request.identifier,
            request.year,
            &request.model,
            &request.plate,
            self.clock.current_year(),
        )?;

        if self
            .motorcycles
            .exists_by_plate(motorcycle.plate.as_str())
            .await?
        {
            return Err(RentalError::business(
                PLATE_EXISTS,
                format!("车牌 {} 已存在", motorcycle.plate),
            ));
        }

        let uow = self.motorcycles.unit_of_work();
        uow.add(motorcycle.clone());
        let uow_ref = &*uow;
        self.retry
            .execute_until_shutdown("motorcycle.save", self.shutdown.clone(), move || uow_ref.commit())
            .await?;

        let event = motorcycle.created_event();
        let publisher = &self.publisher;
        let event_ref = &event;
        if let Err(e) = self
            .retry
            .execute_until_shutdown("motorcycle.publish", self.shutdown.clone(), move || {
                publisher.publish(event_ref, None)
            })
            .await
        {
            // 车辆已落库，事件未送达
            error!(
                motorcycle_id = %motorcycle.id(),
                event_id = %event.id,
                error = %e,
                "车辆登记事件发布失败"
            );
            return Err(e);
        }

        info!(
            motorcycle_id = %motorcycle.id(),
            year = motorcycle.year,
            "车辆已登记"
        );
        Ok(MotorcycleView::from(&motorcycle))
    }

    pub async fn get(&self, id: Uuid) -> Result<MotorcycleView> {
        let motorcycle = self
            .motorcycles
            .get(id)
            .await?
            .ok_or_else(|| RentalError::not_found("motorcycle", id))?;
        Ok(MotorcycleView::from(&motorcycle))
    }
}
