//! 仓储 Trait 定义
//!
//! 读操作直接返回实体；写操作统一通过工作单元暂存后提交。

use async_trait::async_trait;
use uuid::Uuid;

use rental_shared::persistence::UnitOfWork;

use crate::error::Result;
use crate::models::{Driver, Motorcycle, Rental};

/// 租赁仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RentalRepositoryTrait: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Rental>>;
    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Rental>>;

    // 进行中的租赁
    async fn find_active_by_driver(&self, driver_id: Uuid) -> Result<Option<Rental>>;
    async fn find_active_by_motorcycle(&self, motorcycle_id: Uuid) -> Result<Option<Rental>>;

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<Rental>>;
}

/// 车辆仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MotorcycleRepositoryTrait: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Motorcycle>>;
    async fn exists_by_plate(&self, plate: &str) -> Result<bool>;

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<Motorcycle>>;
}

/// 骑手仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriverRepositoryTrait: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Driver>>;
}
