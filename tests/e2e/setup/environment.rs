//! 测试环境
//!
//! 生产端与消费端共享同一个 [`RecordingSink`]，
//! 通过 [`TestEnvironment::deliver_pending`] 把主题上的消息投递给消费者。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use motorcycle_event_consumer::consumer::MotorcycleEventConsumer;
use motorcycle_event_consumer::filter::EventFilter;
use motorcycle_event_consumer::processor::MotorcycleEventProcessor;
use rental_service::clock::{Clock, FixedClock};
use rental_service::lock::KeyedLock;
use rental_service::service::{MotorcycleService, RentalService};
use rental_shared::config::ConsumerConfig;
use rental_shared::dlq::DlqProducer;
use rental_shared::kafka::{Acknowledgement, ConsumerMessage, Topology};
use rental_shared::publisher::EventPublisher;
use rental_shared::retry::RetryPolicy;
use rental_shared::test_utils::RecordingSink;

use super::{MemDrivers, MemEvents, MemMotorcycles, MemRentals};

pub struct TestEnvironment {
    pub topology: Topology,
    pub sink: RecordingSink,
    pub rentals: MemRentals,
    pub motorcycles: MemMotorcycles,
    pub drivers: MemDrivers,
    pub events: MemEvents,
    pub motorcycle_service: MotorcycleService<MemMotorcycles, RecordingSink>,
    pub rental_service: RentalService<MemRentals, MemMotorcycles, MemDrivers>,
    pub consumer: MotorcycleEventConsumer<MemEvents, RecordingSink>,
    delivered: usize,
}

impl TestEnvironment {
    /// “今天”固定为 2024-03-01
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    pub fn new() -> Self {
        Self::with_consumer_config(ConsumerConfig::default())
    }

    pub fn with_consumer_config(consumer_config: ConsumerConfig) -> Self {
        let topology = Topology::default();
        let sink = RecordingSink::new();
        let rentals = MemRentals::default();
        let motorcycles = MemMotorcycles::default();
        let drivers = MemDrivers::default();
        let events = MemEvents::default();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(Self::now()));
        let retry = RetryPolicy::fixed(3, Duration::from_millis(200));

        let motorcycle_service = MotorcycleService::new(
            Arc::new(motorcycles.clone()),
            EventPublisher::new(sink.clone(), topology.clone()),
            retry.clone(),
            clock.clone(),
        );
        let rental_service = RentalService::new(
            Arc::new(rentals.clone()),
            Arc::new(motorcycles.clone()),
            Arc::new(drivers.clone()),
            retry,
            KeyedLock::default(),
            clock,
        );
        let consumer = MotorcycleEventConsumer::new(
            MotorcycleEventProcessor::new(
                Arc::new(events.clone()),
                EventFilter::from_config(&consumer_config),
            ),
            DlqProducer::new(sink.clone(), topology.clone()),
            &consumer_config,
        );

        Self {
            topology,
            sink,
            rentals,
            motorcycles,
            drivers,
            events,
            motorcycle_service,
            rental_service,
            consumer,
            delivered: 0,
        }
    }

    /// 把主主题上尚未投递的消息依次交给消费者
    pub async fn deliver_pending(&mut self) -> Vec<Acknowledgement> {
        let (_tx, mut rx) = watch::channel(false);
        let pending = self.sink.sent_to(&self.topology.main_topic());

        let mut acks = Vec::new();
        for (offset, outbound) in pending.iter().enumerate().skip(self.delivered) {
            let msg = ConsumerMessage::from_outbound(outbound, 0, offset as i64);
            acks.push(self.consumer.handle_delivery(&msg, &mut rx).await);
        }
        self.delivered = pending.len();
        acks
    }
}
