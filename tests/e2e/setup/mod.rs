mod environment;
mod memory;

pub use environment::TestEnvironment;
pub use memory::{MemDrivers, MemEvents, MemMotorcycles, MemRentals};
