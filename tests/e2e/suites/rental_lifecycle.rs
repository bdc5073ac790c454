//! 租赁全流程

use chrono::{NaiveDate, TimeZone, Utc};

use rental_service::models::{CnhType, Driver, Money, RentalPlan, RentalStatus};
use rental_service::service::dto::{CreateMotorcycleRequest, CreateRentalRequest};
use rental_shared::persistence::Entity;

use crate::TestEnvironment;

async fn registered(env: &TestEnvironment, plate: &str) -> uuid::Uuid {
    env.motorcycle_service
        .create(CreateMotorcycleRequest {
            identifier: format!("moto-{plate}"),
            year: 2024,
            model: "Mottu Pop".to_string(),
            plate: plate.to_string(),
        })
        .await
        .unwrap()
        .id
}

fn driver(env: &TestEnvironment, cnh: CnhType) -> Driver {
    let driver = Driver::new(format!("driver-{cnh:?}"), "Rider", cnh);
    env.drivers.0.seed(driver.clone());
    driver
}

#[tokio::test]
async fn test_rent_then_return_late() {
    let env = TestEnvironment::new();
    let motorcycle_id = registered(&env, "HJK1L23").await;
    let rider = driver(&env, CnhType::A);

    let rental = env
        .rental_service
        .create(CreateRentalRequest {
            driver_id: rider.id(),
            motorcycle_id,
            plan: RentalPlan::Days7,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(rental.expected_end_date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

    let returned_at = Utc.with_ymd_and_hms(2024, 3, 12, 17, 30, 0).unwrap();
    let simulation = env
        .rental_service
        .simulate_return(rental.id, returned_at)
        .await
        .unwrap();
    assert_eq!(simulation.additional, Money::from_units(150));
    assert_eq!(simulation.message, "late return, additional 150.00");

    let completed = env
        .rental_service
        .process_return(rental.id, returned_at)
        .await
        .unwrap();
    assert_eq!(completed.status, RentalStatus::Completed);
    assert_eq!(completed.final_amount, Some(Money::from_units(360)));
    assert_eq!(completed.return_date, Some(returned_at));

    let again = env
        .rental_service
        .process_return(rental.id, returned_at)
        .await
        .unwrap_err();
    assert_eq!(again.code(), "INVALID_STATE");
}

#[tokio::test]
async fn test_rider_without_category_a_cannot_rent() {
    let env = TestEnvironment::new();
    let motorcycle_id = registered(&env, "MNP2Q34").await;
    let rider = driver(&env, CnhType::B);

    let err = env
        .rental_service
        .create(CreateRentalRequest {
            driver_id: rider.id(),
            motorcycle_id,
            plan: RentalPlan::Days15,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        })
        .await
        .unwrap_err();

    assert!(err.is_business_error());
    assert!(env.rentals.0.is_empty());
}
