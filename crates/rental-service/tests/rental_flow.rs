//! 租赁流程集成测试
//!
//! 使用内存仓储串起创建、模拟归还和归还结算。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use rental_service::clock::{Clock, FixedClock};
use rental_service::error::{RentalError, Result};
use rental_service::lock::KeyedLock;
use rental_service::models::{CnhType, Driver, Money, Motorcycle, Rental, RentalPlan, RentalStatus};
use rental_service::repository::{DriverRepositoryTrait, MotorcycleRepositoryTrait, RentalRepositoryTrait};
use rental_service::service::RentalService;
use rental_service::service::dto::CreateRentalRequest;
use rental_shared::persistence::{Entity, UnitOfWork};
use rental_shared::retry::RetryPolicy;
use rental_shared::test_utils::InMemoryTable;

#[derive(Clone, Default)]
struct MemRentals(InMemoryTable<Rental>);

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
struct MemMotorcycles(InMemoryTable<Motorcycle>);

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
struct MemDrivers(InMemoryTable<Driver>);

#[async_trait]
impl DriverRepositoryTrait for MemDrivers {
    async fn get(&self, id: Uuid) -> Result<Option<Driver>> {
        Ok(self.0.get(id))
    }
}

struct Fixture {
    rentals: MemRentals,
    driver: Driver,
    motorcycle: Motorcycle,
    service: RentalService<MemRentals, MemMotorcycles, MemDrivers>,
}

fn fixture() -> Fixture {
    let rentals = MemRentals::default();
    let motorcycles = MemMotorcycles::default();
    let drivers = MemDrivers::default();

    let driver = Driver::new("driver-1", "Ana", CnhType::AB);
    let motorcycle = Motorcycle::new("moto-1", 2024, "Titan", "ABC1D23", 2023).unwrap();
    drivers.0.seed(driver.clone());
    motorcycles.0.seed(motorcycle.clone());

    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc.with_ymd_and_hms(2023, 12, 30, 12, 0, 0).unwrap()));
    let service = RentalService::new(
        Arc::new(rentals.clone()),
        Arc::new(motorcycles),
        Arc::new(drivers),
        RetryPolicy::fixed(3, Duration::from_millis(100)),
        KeyedLock::default(),
        clock,
    );

    Fixture {
        rentals,
        driver,
        motorcycle,
        service,
    }
}

fn create_request(f: &Fixture, plan: RentalPlan) -> CreateRentalRequest {
    CreateRentalRequest {
        driver_id: f.driver.id(),
        motorcycle_id: f.motorcycle.id(),
        plan,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    }
}

#[tokio::test]
async fn test_rent_simulate_and_return() {
    let f = fixture();
    let created = f.service.create(create_request(&f, RentalPlan::Days7)).await.unwrap();

    let simulated = f
        .service
        .simulate_return(created.id, Utc.with_ymd_and_hms(2024, 1, 4, 18, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(simulated.final_amount, Money::from_units(114));
    assert_eq!(f.service.get(created.id).await.unwrap(), created);

    let returned = f
        .service
        .process_return(created.id, Utc.with_ymd_and_hms(2024, 1, 4, 18, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(returned.status, RentalStatus::Completed);
    assert_eq!(returned.penalty_amount, Some(Money::from_units(24)));
    assert_eq!(returned.final_amount, Some(Money::from_units(114)));

    let listed = f.service.list_by_driver(f.driver.id()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, RentalStatus::Completed);
}

#[tokio::test]
async fn test_driver_cannot_hold_two_active_rentals() {
    let f = fixture();
    f.service.create(create_request(&f, RentalPlan::Days7)).await.unwrap();

    let err = f
        .service
        .create(create_request(&f, RentalPlan::Days15))
        .await
        .unwrap_err();
    assert!(err.is_business_error());
    assert_eq!(f.rentals.0.len(), 1);
}

#[tokio::test]
async fn test_motorcycle_is_available_again_after_return() {
    let f = fixture();
    let first = f.service.create(create_request(&f, RentalPlan::Days7)).await.unwrap();
    f.service
        .process_return(first.id, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap())
        .await
        .unwrap();

    let second = f.service.create(create_request(&f, RentalPlan::Days30)).await.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.total_amount, Money::from_units(660));
}

#[tokio::test]
async fn test_concurrent_returns_settle_once() {
    let f = fixture();
    let created = f.service.create(create_request(&f, RentalPlan::Days7)).await.unwrap();
    let late = Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap();
    let early = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();

    let (a, b) = tokio::join!(
        f.service.process_return(created.id, late),
        f.service.process_return(created.id, early),
    );

    let (ok, err) = match (a, b) {
        (Ok(view), Err(e)) | (Err(e), Ok(view)) => (view, e),
        other => panic!("expected exactly one successful return, got {other:?}"),
    };
    assert!(matches!(
        err,
        RentalError::InvalidState(_) | RentalError::ConcurrencyConflict { .. }
    ));

    let stored = f.rentals.0.get(created.id).unwrap();
    assert_eq!(stored.meta().version, 1);
    assert_eq!(
        stored.settlement().map(|s| s.final_amount),
        ok.final_amount
    );
}

#[tokio::test]
async fn test_stale_update_is_a_conflict() {
    let f = fixture();
    let created = f.service.create(create_request(&f, RentalPlan::Days15)).await.unwrap();
    let mut stale = f.rentals.0.get(created.id).unwrap();

    f.service
        .process_return(created.id, Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap())
        .await
        .unwrap();

    stale
        .process_return(Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap())
        .unwrap();
    let uow = f.rentals.0.unit_of_work();
    uow.update(stale);
    let err = uow.commit().await.unwrap_err();

    assert!(matches!(err, RentalError::ConcurrencyConflict { .. }));
    assert!(!err.is_retryable());
    let stored = f.rentals.0.get(created.id).unwrap();
    assert_eq!(stored.settlement().map(|s| s.final_amount), Some(Money::from_units(420)));
}

#[tokio::test(start_paused = true)]
async fn test_return_commit_gives_up_after_three_attempts() {
    let f = fixture();
    let created = f.service.create(create_request(&f, RentalPlan::Days7)).await.unwrap();
    f.rentals.0.fail_next_commits(3);

    let err = f
        .service
        .process_return(created.id, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    let stored = f.rentals.0.get(created.id).unwrap();
    assert_eq!(stored.status(), RentalStatus::Active);
    assert_eq!(stored.meta().version, 0);
}
