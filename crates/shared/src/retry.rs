//! 重试策略与执行器
//!
//! 为瞬时故障（数据库连接池满、Broker 暂不可用等）提供有限次数的自动重试。
//! 业务逻辑错误不应被重试，由调用方通过 `is_retryable` 闭包控制。
//!
//! 等待期间可以被取消：直接丢弃返回的 Future，或使用
//! [`retry_until_shutdown`] 在收到关闭信号时提前返回 `Cancelled`。

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::RentalError;
use crate::observability;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// 重试策略配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 总尝试次数（含首次执行）
    pub max_attempts: u32,
    /// 第一次失败后的等待时间
    pub initial_delay: Duration,
    /// 退避时间上限
    pub max_delay: Duration,
    /// 每次失败后等待时间的倍数，1.0 表示固定间隔
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// 默认策略：共尝试 3 次，每次失败后固定等待 1 秒
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// 固定间隔策略
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// 指数退避策略：base, 2*base, 4*base ...
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: base_delay,
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }

    /// 根据配置构造固定间隔策略
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::fixed(config.max_attempts, Duration::from_millis(config.delay_ms))
    }

    /// 第 `attempt` 次尝试失败后的等待时间（attempt 从 1 开始）
    ///
    /// 公式: initial_delay * multiplier^(attempt-1)，结果不超过 max_delay。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// 第 `attempt` 次尝试失败后是否还有剩余次数
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 按错误自身的可重试性执行操作
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, RentalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RentalError>>,
    {
        retry_with_policy(self, operation_name, RentalError::is_retryable, operation).await
    }

    /// 与 [`execute`](Self::execute) 相同，退避期间收到关闭信号时返回 `Cancelled`
    pub async fn execute_until_shutdown<F, Fut, T>(
        &self,
        operation_name: &str,
        shutdown: watch::Receiver<bool>,
        operation: F,
    ) -> Result<T, RentalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RentalError>>,
    {
        retry_until_shutdown(self, operation_name, RentalError::is_retryable, shutdown, operation).await
    }
}

// ---------------------------------------------------------------------------
// 执行器
// ---------------------------------------------------------------------------

/// 带重试的异步执行器
///
/// 仅在操作返回可重试错误时才重试；次数耗尽后原样返回最后一次的错误。
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&RentalError) -> bool,
    operation: F,
) -> Result<T, RentalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RentalError>>,
{
    run(policy, operation_name, is_retryable, None, operation).await
}

/// 与 [`retry_with_policy`] 相同，但在退避等待期间监听关闭信号
///
/// 收到关闭信号时立即返回 `RentalError::Cancelled`，不再发起下一次尝试。
pub async fn retry_until_shutdown<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&RentalError) -> bool,
    shutdown: watch::Receiver<bool>,
    operation: F,
) -> Result<T, RentalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RentalError>>,
{
    run(policy, operation_name, is_retryable, Some(shutdown), operation).await
}

async fn run<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&RentalError) -> bool,
    mut shutdown: Option<watch::Receiver<bool>>,
    mut operation: F,
) -> Result<T, RentalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RentalError>>,
{
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "操作在重试后成功");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    warn!(
                        operation = operation_name,
                        error = %err,
                        "操作失败且不可重试，直接返回错误"
                    );
                    return Err(err);
                }

                if !policy.has_attempts_left(attempt) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "已达最大尝试次数，放弃重试"
                    );
                    return Err(err);
                }

                observability::metrics::record_retry_attempt(operation_name);
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "操作失败，将在等待后重试"
                );

                match shutdown.as_mut() {
                    Some(rx) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = wait_for_shutdown(rx) => {
                                warn!(operation = operation_name, attempt, "收到关闭信号，取消重试");
                                return Err(RentalError::Cancelled(operation_name.to_string()));
                            }
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
                attempt += 1;
            }
        }
    }
}

/// 等待关闭信号变为 true
///
/// 发送端被丢弃时永远挂起，不会误触发关闭。
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 为单次操作加上超时限制，超时映射为 `RentalError::Timeout`
pub async fn with_timeout<Fut, T>(
    timeout: Duration,
    operation_name: &str,
    operation: Fut,
) -> Result<T, RentalError>
where
    Fut: Future<Output = Result<T, RentalError>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| RentalError::Timeout {
            operation: operation_name.to_string(),
        })?
}
