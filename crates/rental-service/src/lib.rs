//! 摩托车租赁服务
//!
//! 车辆登记、租赁创建与归还结算。车辆登记后通过 Kafka 发布事件，
//! 由 `motorcycle-event-consumer` 消费。

pub mod clock;
pub mod error;
pub mod lock;
pub mod models;
pub mod pricing;
pub mod repository;
pub mod service;

pub use error::{RentalError, Result};
