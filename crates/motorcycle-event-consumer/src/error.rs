//! 消费者专用错误类型

use rental_shared::error::RentalError;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// 消息体无法解析为车辆登记事件
    #[error("消息格式非法: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Shared(#[from] RentalError),
}
