//! 事件过滤

use rental_shared::config::ConsumerConfig;
use rental_shared::events::MotorcycleCreatedEvent;

/// 决定哪些事件需要写入投影
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// 只接受指定出厂年份
    Year(i32),
    AcceptAll,
}

impl EventFilter {
    pub fn from_config(config: &ConsumerConfig) -> Self {
        match config.filter_year {
            Some(year) => Self::Year(year),
            None => Self::AcceptAll,
        }
    }

    pub fn accepts(&self, event: &MotorcycleCreatedEvent) -> bool {
        match self {
            Self::Year(year) => event.year == *year,
            Self::AcceptAll => true,
        }
    }
}
