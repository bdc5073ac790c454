//! 车辆事件消费者
//!
//! 消费车辆登记事件，按年份过滤后写入 `motorcycle_events` 投影表。
//! 处理失败按指数退避重试，次数耗尽后转入死信队列。

pub mod consumer;
pub mod error;
pub mod filter;
pub mod models;
pub mod processor;
pub mod repository;
