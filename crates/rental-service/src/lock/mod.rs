//! 进程内锁
//!
//! 同一租赁的归还操作串行化；跨实例的并发由数据库版本校验兜底。

mod keyed_lock;

pub use keyed_lock::{KeyedLock, KeyedLockGuard, LockConfig};
