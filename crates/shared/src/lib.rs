//! 共享库
//!
//! 包含所有服务共用的配置、错误处理、重试、数据库、Kafka 与事件发布等基础设施代码。

pub mod config;
pub mod database;
pub mod dlq;
pub mod error;
pub mod events;
pub mod kafka;
pub mod observability;
pub mod persistence;
pub mod publisher;
pub mod retry;
pub mod test_utils;
