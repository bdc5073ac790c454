//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 错误按处理策略分类：校验与业务规则错误直接返回调用方，
//! 基础设施的瞬时故障交给重试策略，其余错误记录后统一对外报告。

use thiserror::Error;

/// 错误分类
///
/// 调用边界根据分类决定对外暴露的信息，内部日志始终保留原始错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 调用方输入格式错误
    Validation,
    /// 业务规则被违反（包括状态不允许的操作）
    BusinessRule,
    /// 实体不存在
    NotFound,
    /// 数据库或消息中间件的瞬时故障，可重试
    Transient,
    /// 重试也无法恢复的处理失败
    Permanent,
    /// 未分类错误
    Unclassified,
}

/// 系统错误类型
#[derive(Debug, Error)]
pub enum RentalError {
    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 业务逻辑错误 ====================
    #[error("业务规则冲突 [{code}]: {message}")]
    BusinessRule { code: &'static str, message: String },

    #[error("状态不允许此操作: {0}")]
    InvalidState(String),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("并发冲突: {entity} id={id} 已被其他操作修改")]
    ConcurrencyConflict { entity: &'static str, id: String },

    // ==================== 基础设施错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Kafka 错误: {0}")]
    Kafka(String),

    #[error("操作超时: {operation}")]
    Timeout { operation: String },

    // ==================== 处理错误 ====================
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("操作已取消: {0}")]
    Cancelled(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, RentalError>;

/// 对外报告未分类错误时使用的通用信息
pub const GENERIC_ERROR_MESSAGE: &str = "处理请求时发生内部错误，请稍后重试";

impl RentalError {
    /// 便捷构造业务规则错误
    pub fn business(code: &'static str, message: impl Into<String>) -> Self {
        Self::BusinessRule {
            code,
            message: message.into(),
        }
    }

    /// 便捷构造未找到错误
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule { code, .. } => code,
            Self::InvalidState(_) => "INVALID_STATE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Cancelled(_) => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::BusinessRule { .. } | Self::InvalidState(_) | Self::ConcurrencyConflict { .. } => {
                ErrorKind::BusinessRule
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database(err) if is_transient_db_error(err) => ErrorKind::Transient,
            Self::Kafka(_) | Self::Timeout { .. } => ErrorKind::Transient,
            Self::Database(_) | Self::Serialization(_) => ErrorKind::Permanent,
            Self::Cancelled(_) | Self::Internal(_) => ErrorKind::Unclassified,
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有瞬时故障会被重试，校验错误和业务规则错误永远不重试。
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// 是否为业务错误（可以原样返回给调用方）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::BusinessRule | ErrorKind::NotFound
        )
    }

    /// 对外暴露的错误信息
    ///
    /// 业务错误返回具体信息，其余错误只返回通用信息，细节保留在日志中。
    pub fn public_message(&self) -> String {
        if self.is_business_error() {
            self.to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        }
    }
}

/// 判断数据库错误是否属于瞬时故障
///
/// 连接类错误、串行化失败、死锁和锁等待超时可以通过重试恢复；
/// 唯一约束冲突、行不存在等错误重试后结果不变。
pub fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            // serialization_failure / deadlock_detected / lock_not_available / admin_shutdown
            Some("40001") | Some("40P01") | Some("55P03") | Some("57P01")
        ),
        _ => false,
    }
}
