//! 进程内按键加锁

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RentalError, Result};

/// 锁配置
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 等待锁的最长时间
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// 按实体 ID 加锁
///
/// 同一 ID 的操作串行执行，不同 ID 互不影响。
#[derive(Clone, Default)]
pub struct KeyedLock {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    config: LockConfig,
}

impl KeyedLock {
    pub fn new(config: LockConfig) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 获取锁，超时返回 `RentalError::Timeout`
    pub async fn acquire(&self, key: Uuid) -> Result<KeyedLockGuard> {
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.config.acquire_timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(key = %key, "获取锁成功");
                Ok(KeyedLockGuard {
                    key,
                    locks: Arc::clone(&self.locks),
                    guard: Some(guard),
                })
            }
            Err(_) => {
                warn!(
                    key = %key,
                    timeout_ms = self.config.acquire_timeout.as_millis() as u64,
                    "获取锁超时"
                );
                Err(RentalError::Timeout {
                    operation: format!("lock:{key}"),
                })
            }
        }
    }

    /// 当前登记的键数量
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// 锁守卫，Drop 时释放锁
pub struct KeyedLockGuard {
    key: Uuid,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLockGuard {
    pub fn key(&self) -> Uuid {
        self.key
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // 没有其他持有者或等待者时回收条目
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
