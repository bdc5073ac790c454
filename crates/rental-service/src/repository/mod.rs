//! 数据库仓储层
//!
//! 仓储只负责数据存取，不包含业务逻辑。写操作通过
//! [`UnitOfWork`](rental_shared::persistence::UnitOfWork) 在事务内提交，
//! 更新统一带版本校验。

mod driver_repo;
mod motorcycle_repo;
mod rental_repo;
mod traits;

pub use driver_repo::DriverRepository;
pub use motorcycle_repo::{MotorcycleRepository, PLATE_EXISTS};
pub use rental_repo::RentalRepository;
pub use traits::*;

/// PostgreSQL 唯一约束冲突 SQLSTATE
const UNIQUE_VIOLATION: &str = "23505";
