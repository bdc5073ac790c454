//! 业务服务层

pub mod dto;
mod motorcycle_service;
mod rental_service;

pub use motorcycle_service::MotorcycleService;
pub use rental_service::{RentalService, codes};
