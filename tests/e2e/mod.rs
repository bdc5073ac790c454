//! 端到端测试
//!
//! 在进程内串起完整链路，不依赖外部 Kafka 与 PostgreSQL：
//! - 车辆登记 -> 事件发布 -> 消费者投影
//! - 租赁创建 -> 归还模拟 -> 归还结算
//! - 投影失败 -> 死信队列

pub mod setup;
pub mod suites;

pub use setup::TestEnvironment;
