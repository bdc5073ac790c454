//! 骑手仓储
//!
//! 骑手的登记不在本服务范围内，这里只提供只读查询。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use rental_shared::persistence::EntityMeta;

use super::traits::DriverRepositoryTrait;
use crate::error::Result;
use crate::models::{CnhType, Driver};

#[derive(Debug, sqlx::FromRow)]
struct DriverRow {
    id: Uuid,
    identifier: String,
    name: String,
    cnh_type: CnhType,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Driver {
            meta: EntityMeta {
                id: row.id,
                version: row.version,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            identifier: row.identifier,
            name: row.name,
            cnh_type: row.cnh_type,
        }
    }
}

pub struct DriverRepository {
    pool: PgPool,
}

impl DriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriverRepositoryTrait for DriverRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Driver>> {
        let row = sqlx::query_as::<_, DriverRow>(
            r#"
            SELECT id, identifier, name, cnh_type, version, created_at, updated_at
            FROM drivers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Driver::from))
    }
}
