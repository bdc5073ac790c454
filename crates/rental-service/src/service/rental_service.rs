//! 租赁服务
//!
//! 处理租赁创建、查询、归还模拟和归还结算。
//!
//! ## 归还流程
//!
//! 1. 获取该租赁的进程内锁 -> 2. 读取租赁 -> 3. 领域对象结算
//!    -> 4. 工作单元提交带版本校验的更新（瞬时故障按策略重试）
//!
//! 跨实例的并发归还由版本校验转换为 `ConcurrencyConflict`。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use rental_shared::observability::metrics;
use rental_shared::persistence::{Entity, UnitOfWork};
use rental_shared::retry::RetryPolicy;

use crate::clock::Clock;
use crate::error::{RentalError, Result};
use crate::lock::KeyedLock;
use crate::models::Rental;
use crate::repository::{DriverRepositoryTrait, MotorcycleRepositoryTrait, RentalRepositoryTrait};
use crate::service::dto::{CreateRentalRequest, RentalView, ReturnSimulationView};

/// 业务错误码
pub mod codes {
    pub const CNH_NOT_ALLOWED: &str = "CNH_NOT_ALLOWED";
    pub const DRIVER_HAS_ACTIVE_RENTAL: &str = "DRIVER_HAS_ACTIVE_RENTAL";
    pub const MOTORCYCLE_UNAVAILABLE: &str = "MOTORCYCLE_UNAVAILABLE";
}

pub struct RentalService<R, M, D> {
    rentals: Arc<R>,
    motorcycles: Arc<M>,
    drivers: Arc<D>,
    retry: RetryPolicy,
    lock: KeyedLock,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
}

impl<R, M, D> RentalService<R, M, D>
where
    R: RentalRepositoryTrait,
    M: MotorcycleRepositoryTrait,
    D: DriverRepositoryTrait,
{
    pub fn new(
        rentals: Arc<R>,
        motorcycles: Arc<M>,
        drivers: Arc<D>,
        retry: RetryPolicy,
        lock: KeyedLock,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rentals,
            motorcycles,
            drivers,
            retry,
            lock,
            clock,
            shutdown: watch::channel(false).1,
        }
    }

    /// 关闭信号到达时放弃退避中的重试
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// 创建租赁
    #[instrument(skip(self, request), fields(driver_id = %request.driver_id, motorcycle_id = %request.motorcycle_id))]
    pub async fn create(&self, request: CreateRentalRequest) -> Result<RentalView> {
        let today = self.clock.today();
        if request.start_date <= today {
            return Err(RentalError::Validation(format!(
                "起租日期 {} 必须晚于今天 {}",
                request.start_date, today
            )));
        }

        let driver = self
            .drivers
            .get(request.driver_id)
            .await?
            .ok_or_else(|| RentalError::not_found("driver", request.driver_id))?;
        if !driver.can_rent() {
            return Err(RentalError::business(
                codes::CNH_NOT_ALLOWED,
                format!("驾驶证类型 {:?} 不允许租赁摩托车", driver.cnh_type),
            ));
        }
        if self
            .rentals
            .find_active_by_driver(request.driver_id)
            .await?
            .is_some()
        {
            return Err(RentalError::business(
                codes::DRIVER_HAS_ACTIVE_RENTAL,
                "骑手已有进行中的租赁",
            ));
        }

        self.motorcycles
            .get(request.motorcycle_id)
            .await?
            .ok_or_else(|| RentalError::not_found("motorcycle", request.motorcycle_id))?;
        if self
            .rentals
            .find_active_by_motorcycle(request.motorcycle_id)
            .await?
            .is_some()
        {
            return Err(RentalError::business(
                codes::MOTORCYCLE_UNAVAILABLE,
                "车辆已被租出",
            ));
        }

        let rental = Rental::new(
            request.motorcycle_id,
            request.driver_id,
            request.plan,
            request.start_date,
        );

        let uow = self.rentals.unit_of_work();
        uow.add(rental.clone());
        let uow_ref = &*uow;
        self.retry
            .execute_until_shutdown("rental.create", self.shutdown.clone(), move || uow_ref.commit())
            .await?;

        info!(
            rental_id = %rental.id(),
            plan = %rental.plan(),
            total_amount = %rental.total_amount(),
            "租赁已创建"
        );
        Ok(RentalView::from(&rental))
    }

    pub async fn get(&self, id: Uuid) -> Result<RentalView> {
        let rental = self.load(id).await?;
        Ok(RentalView::from(&rental))
    }

    pub async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<RentalView>> {
        let rentals = self.rentals.list_by_driver(driver_id).await?;
        Ok(rentals.iter().map(RentalView::from).collect())
    }

    /// 模拟归还，不修改租赁
    pub async fn simulate_return(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
    ) -> Result<ReturnSimulationView> {
        let rental = self.load(id).await?;
        let quote = rental.simulate_return(return_date)?;
        Ok(ReturnSimulationView::from_quote(&quote, rental.daily_rate()))
    }

    /// 执行归还结算
    #[instrument(skip(self))]
    pub async fn process_return(&self, id: Uuid, return_date: DateTime<Utc>) -> Result<RentalView> {
        let _guard = self.lock.acquire(id).await?;

        let mut rental = self.load(id).await?;
        let quote = rental.process_return(return_date)?;

        let uow = self.rentals.unit_of_work();
        uow.update(rental.clone());
        let uow_ref = &*uow;
        if let Err(e) = self
            .retry
            .execute_until_shutdown("rental.return", self.shutdown.clone(), move || uow_ref.commit())
            .await
        {
            warn!(rental_id = %id, error = %e, "归还结算保存失败");
            return Err(e);
        }

        metrics::record_rental_return(quote.kind().as_str());
        info!(
            rental_id = %id,
            kind = quote.kind().as_str(),
            actual_days = quote.actual_days,
            final_amount = %quote.final_amount,
            "租赁已归还"
        );
        Ok(RentalView::from(&rental))
    }

    async fn load(&self, id: Uuid) -> Result<Rental> {
        self.rentals
            .get(id)
            .await?
            .ok_or_else(|| RentalError::not_found("rental", id))
    }
}
