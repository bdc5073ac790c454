//! 内存仓储

use async_trait::async_trait;
use uuid::Uuid;

use motorcycle_event_consumer::models::MotorcycleEvent;
use motorcycle_event_consumer::repository::MotorcycleEventRepositoryTrait;
use rental_service::models::{Driver, Motorcycle, Rental};
use rental_service::repository::{DriverRepositoryTrait, MotorcycleRepositoryTrait, RentalRepositoryTrait};
use rental_shared::error::Result;
use rental_shared::persistence::UnitOfWork;
use rental_shared::test_utils::InMemoryTable;

#[derive(Clone, Default)]
pub struct MemRentals(pub InMemoryTable<Rental>);

#[async_trait]
impl RentalRepositoryTrait for MemRentals {
    async fn get(&self, id: Uuid) -> Result<Option<Rental>> {
        Ok(self.0.get(id))
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Rental>> {
        Ok(self.0.find(|r| r.driver_id() == driver_id))
    }

    async fn find_active_by_driver(&self, driver_id: Uuid) -> Result<Option<Rental>> {
        Ok(self
            .0
            .find(|r| r.driver_id() == driver_id && r.is_active())
            .into_iter()
            .next())
    }

    async fn find_active_by_motorcycle(&self, motorcycle_id: Uuid) -> Result<Option<Rental>> {
        Ok(self
            .0
            .find(|r| r.motorcycle_id() == motorcycle_id && r.is_active())
            .into_iter()
            .next())
    }

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<Rental>> {
        Box::new(self.0.unit_of_work())
    }
}

#[derive(Clone, Default)]
pub struct MemMotorcycles(pub InMemoryTable<Motorcycle>);

#[async_trait]
impl MotorcycleRepositoryTrait for MemMotorcycles {
    async fn get(&self, id: Uuid) -> Result<Option<Motorcycle>> {
        Ok(self.0.get(id))
    }

    async fn exists_by_plate(&self, plate: &str) -> Result<bool> {
        Ok(!self.0.find(|m| m.plate.as_str() == plate).is_empty())
    }

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<Motorcycle>> {
        Box::new(self.0.unit_of_work())
    }
}

#[derive(Clone, Default)]
pub struct MemDrivers(pub InMemoryTable<Driver>);

#[async_trait]
impl DriverRepositoryTrait for MemDrivers {
    async fn get(&self, id: Uuid) -> Result<Option<Driver>> {
        Ok(self.0.get(id))
    }
}

#[derive(Clone, Default)]
pub struct MemEvents(pub InMemoryTable<MotorcycleEvent>);

#[async_trait]
impl MotorcycleEventRepositoryTrait for MemEvents {
    async fn get(&self, id: Uuid) -> Result<Option<MotorcycleEvent>> {
        Ok(self.0.get(id))
    }

    async fn list_by_year(&self, year: i32) -> Result<Vec<MotorcycleEvent>> {
        Ok(self.0.find(|e| e.year == year))
    }

    async fn list_unprocessed(&self) -> Result<Vec<MotorcycleEvent>> {
        Ok(self.0.find(|e| !e.is_processed()))
    }

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<MotorcycleEvent>> {
        Box::new(self.0.unit_of_work())
    }
}
