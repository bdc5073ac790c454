//! 车辆登记到事件投影的全链路

use std::time::Duration;

use motorcycle_event_consumer::repository::MotorcycleEventRepositoryTrait;
use rental_service::service::dto::CreateMotorcycleRequest;
use rental_shared::config::ConsumerConfig;
use rental_shared::dlq::DeadLetterMessage;
use rental_shared::kafka::Acknowledgement;
use rental_shared::publisher::headers;

use crate::TestEnvironment;

fn request(year: i32, plate: &str) -> CreateMotorcycleRequest {
    CreateMotorcycleRequest {
        identifier: format!("moto-{plate}"),
        year,
        model: "Mottu Sport".to_string(),
        plate: plate.to_string(),
    }
}

#[tokio::test]
async fn test_registered_motorcycle_is_projected() {
    let mut env = TestEnvironment::new();

    let view = env
        .motorcycle_service
        .create(request(2024, "ABC1D23"))
        .await
        .unwrap();

    let published = env.sink.sent_to(&env.topology.main_topic());
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].header(headers::CONTENT_TYPE), Some(headers::JSON));
    assert!(published[0].header(headers::TIMESTAMP).is_some());

    assert_eq!(env.deliver_pending().await, vec![Acknowledgement::Ack]);

    let projected = env.events.list_by_year(2024).await.unwrap();
    assert_eq!(projected.len(), 1);
    assert_eq!(projected[0].motorcycle_id, view.id);
    assert!(projected[0].is_processed());
    assert_eq!(projected[0].event_data["plate"], "ABC1D23");
    assert!(env.events.list_unprocessed().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_only_configured_year_is_projected() {
    let mut env = TestEnvironment::new();
    env.motorcycle_service.create(request(2023, "AAA1A11")).await.unwrap();
    env.motorcycle_service.create(request(2024, "BBB2B22")).await.unwrap();
    env.motorcycle_service.create(request(2025, "CCC3C33")).await.unwrap();

    let acks = env.deliver_pending().await;

    assert_eq!(acks, vec![Acknowledgement::Ack; 3]);
    assert_eq!(env.events.0.len(), 1);
    assert_eq!(env.events.list_by_year(2024).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_filter_can_be_disabled() {
    let mut env = TestEnvironment::with_consumer_config(ConsumerConfig {
        filter_year: None,
        ..ConsumerConfig::default()
    });
    env.motorcycle_service.create(request(2019, "DDD4D44")).await.unwrap();
    env.motorcycle_service.create(request(2024, "EEE5E55")).await.unwrap();

    env.deliver_pending().await;
    assert_eq!(env.events.0.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_projection_outage_routes_to_dead_letter_queue() {
    let mut env = TestEnvironment::new();
    env.motorcycle_service.create(request(2024, "FFF6F66")).await.unwrap();
    env.events.0.fail_next_commits(u32::MAX);

    let started = tokio::time::Instant::now();
    let acks = env.deliver_pending().await;

    assert_eq!(acks, vec![Acknowledgement::Ack]);
    assert_eq!(started.elapsed(), Duration::from_secs(3));

    let dead = env.sink.sent_to(&env.topology.dead_letter_topic());
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].header(headers::TYPE), Some(DeadLetterMessage::TYPE_NAME));
    let body: DeadLetterMessage = serde_json::from_slice(&dead[0].payload).unwrap();
    assert_eq!(body.attempts, 3);
    assert!(body.original_message.contains("FFF6F66"));
    assert!(env.events.0.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_broker_hiccup_is_absorbed_by_publisher_retry() {
    let mut env = TestEnvironment::new();
    env.sink.fail_next(1);

    env.motorcycle_service.create(request(2024, "GGG7G77")).await.unwrap();

    assert_eq!(env.sink.attempts(), 2);
    assert_eq!(env.deliver_pending().await, vec![Acknowledgement::Ack]);
    assert_eq!(env.events.0.len(), 1);
}
