//! PostgreSQL 连接池
//!
//! 启动时建立连接池，按配置执行内嵌的迁移脚本，并做一次连通性检查。

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// 工作区根目录 migrations/ 下的迁移脚本，编译期内嵌
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 打开连接池
    ///
    /// `run_migrations` 为 true 时先执行迁移；返回前执行 `SELECT 1` 确认可用。
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let pool = pool_options(config).connect(&config.url).await?;
        let db = Self { pool };

        if config.run_migrations {
            MIGRATOR.run(&db.pool).await.map_err(sqlx::Error::from)?;
            info!(migrations = MIGRATOR.iter().count(), "数据库迁移完成");
        }
        db.ping().await?;

        info!("PostgreSQL 连接池就绪");
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// 等待借出的连接归还后关闭连接池
    pub async fn close(self) {
        self.pool.close().await;
        info!("PostgreSQL 连接池已关闭");
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
}
