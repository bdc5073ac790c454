//! 领域模型

mod driver;
mod enums;
mod money;
mod motorcycle;
mod rental;

pub use driver::Driver;
pub use enums::{CnhType, RentalPlan, RentalStatus};
pub use money::Money;
pub use motorcycle::{MIN_YEAR, Motorcycle, Plate};
pub use rental::{Rental, RentalPeriod, ReturnSettlement};
