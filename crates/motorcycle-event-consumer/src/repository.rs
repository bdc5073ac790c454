//! 车辆事件仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use rental_shared::error::{RentalError, Result};
use rental_shared::persistence::{EntityMeta, PgPersist, PgUnitOfWork, UnitOfWork};

use crate::models::{EventType, MotorcycleEvent};

/// 车辆事件仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MotorcycleEventRepositoryTrait: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<MotorcycleEvent>>;
    async fn list_by_year(&self, year: i32) -> Result<Vec<MotorcycleEvent>>;

    /// 已写入但未标记处理完成的事件
    async fn list_unprocessed(&self) -> Result<Vec<MotorcycleEvent>>;

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<MotorcycleEvent>>;
}

#[derive(Debug, sqlx::FromRow)]
struct MotorcycleEventRow {
    id: Uuid,
    motorcycle_id: Uuid,
    event_type: EventType,
    year: i32,
    event_data: serde_json::Value,
    processed_at: Option<DateTime<Utc>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MotorcycleEventRow> for MotorcycleEvent {
    fn from(row: MotorcycleEventRow) -> Self {
        Self {
            meta: EntityMeta {
                id: row.id,
                version: row.version,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            motorcycle_id: row.motorcycle_id,
            event_type: row.event_type,
            year: row.year,
            event_data: row.event_data,
            processed_at: row.processed_at,
        }
    }
}

pub struct MotorcycleEventRepository {
    pool: PgPool,
}

impl MotorcycleEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MotorcycleEventRepositoryTrait for MotorcycleEventRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<MotorcycleEvent>> {
        let row = sqlx::query_as::<_, MotorcycleEventRow>(
            r#"
            SELECT id, motorcycle_id, event_type, year, event_data, processed_at,
                   version, created_at, updated_at
            FROM motorcycle_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MotorcycleEvent::from))
    }

    #[instrument(skip(self))]
    async fn list_by_year(&self, year: i32) -> Result<Vec<MotorcycleEvent>> {
        let rows = sqlx::query_as::<_, MotorcycleEventRow>(
            r#"
            SELECT id, motorcycle_id, event_type, year, event_data, processed_at,
                   version, created_at, updated_at
            FROM motorcycle_events
            WHERE year = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MotorcycleEvent::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_unprocessed(&self) -> Result<Vec<MotorcycleEvent>> {
        let rows = sqlx::query_as::<_, MotorcycleEventRow>(
            r#"
            SELECT id, motorcycle_id, event_type, year, event_data, processed_at,
                   version, created_at, updated_at
            FROM motorcycle_events
            WHERE processed_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MotorcycleEvent::from).collect())
    }

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<MotorcycleEvent>> {
        Box::new(PgUnitOfWork::<MotorcycleEvent>::new(self.pool.clone()))
    }
}

#[async_trait]
impl PgPersist for MotorcycleEvent {
    async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO motorcycle_events (
                id, motorcycle_id, event_type, year, event_data, processed_at,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(self.meta.id)
        .bind(self.motorcycle_id)
        .bind(self.event_type)
        .bind(self.year)
        .bind(&self.event_data)
        .bind(self.processed_at)
        .bind(self.meta.version)
        .bind(self.meta.created_at)
        .bind(self.meta.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn update(&self, conn: &mut PgConnection) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE motorcycle_events
            SET processed_at = $3, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(self.meta.id)
        .bind(self.meta.version)
        .bind(self.processed_at)
        .bind(self.meta.updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RentalError::ConcurrencyConflict {
                entity: "motorcycle_event",
                id: self.meta.id.to_string(),
            });
        }
        Ok(())
    }
}
