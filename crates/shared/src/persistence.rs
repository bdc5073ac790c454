//! 持久化抽象
//!
//! 读操作由各仓储直接执行；写操作先暂存在 [`UnitOfWork`] 中，
//! 调用 `commit` 时在同一个数据库事务内一次性落库。
//! 提交失败时暂存的写操作保持不变，调用方可以直接重试 `commit`。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::RentalError;

/// 实体公共元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: Uuid,
    /// 乐观锁版本号，每次成功更新后加一
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 刷新更新时间
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// 拥有 [`EntityMeta`] 的实体
pub trait Entity {
    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn id(&self) -> Uuid {
        self.meta().id
    }
}

/// 写操作暂存与提交
#[async_trait]
pub trait UnitOfWork<T: Send>: Send + Sync {
    /// 暂存新增
    fn add(&self, entity: T);

    /// 暂存更新
    fn update(&self, entity: T);

    /// 在一个事务内提交全部暂存写操作，返回写入条数
    async fn commit(&self) -> Result<u64, RentalError>;
}

/// 可写入 PostgreSQL 的实体
#[async_trait]
pub trait PgPersist: Send + Sync + 'static {
    async fn insert(&self, conn: &mut PgConnection) -> Result<(), RentalError>;

    /// 带版本校验的更新，版本不匹配时返回 `ConcurrencyConflict`
    async fn update(&self, conn: &mut PgConnection) -> Result<(), RentalError>;
}

/// 暂存的写操作
#[derive(Debug, Clone)]
pub enum PendingWrite<T> {
    Insert(T),
    Update(T),
}

/// 基于 sqlx 事务的 [`UnitOfWork`] 实现
pub struct PgUnitOfWork<T> {
    pool: PgPool,
    pending: Mutex<Vec<PendingWrite<T>>>,
}

impl<T: PgPersist> PgUnitOfWork<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            pending: Mutex::new(Vec::new()),
        }
    }

    async fn flush(&self, writes: &[PendingWrite<T>]) -> Result<(), RentalError> {
        let mut tx = self.pool.begin().await?;
        for write in writes {
            match write {
                PendingWrite::Insert(entity) => entity.insert(&mut *tx).await?,
                PendingWrite::Update(entity) => entity.update(&mut *tx).await?,
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl<T: PgPersist> UnitOfWork<T> for PgUnitOfWork<T> {
    fn add(&self, entity: T) {
        self.pending.lock().push(PendingWrite::Insert(entity));
    }

    fn update(&self, entity: T) {
        self.pending.lock().push(PendingWrite::Update(entity));
    }

    async fn commit(&self) -> Result<u64, RentalError> {
        let writes = std::mem::take(&mut *self.pending.lock());
        if writes.is_empty() {
            return Ok(0);
        }

        match self.flush(&writes).await {
            Ok(()) => Ok(writes.len() as u64),
            Err(e) => {
                // 事务已回滚，恢复暂存内容以便重试
                let mut pending = self.pending.lock();
                let staged_later = std::mem::replace(&mut *pending, writes);
                pending.extend(staged_later);
                Err(e)
            }
        }
    }
}
