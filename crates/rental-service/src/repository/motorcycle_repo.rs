//! 车辆仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use rental_shared::persistence::{EntityMeta, PgPersist, PgUnitOfWork, UnitOfWork};

use super::UNIQUE_VIOLATION;
use super::traits::MotorcycleRepositoryTrait;
use crate::error::{RentalError, Result};
use crate::models::{Motorcycle, Plate};

/// 车牌唯一索引冲突时的业务错误码
pub const PLATE_EXISTS: &str = "PLATE_EXISTS";

#[derive(Debug, sqlx::FromRow)]
struct MotorcycleRow {
    id: Uuid,
    identifier: String,
    year: i32,
    model: String,
    plate: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MotorcycleRow> for Motorcycle {
    type Error = RentalError;

    fn try_from(row: MotorcycleRow) -> Result<Self> {
        Ok(Motorcycle {
            meta: EntityMeta {
                id: row.id,
                version: row.version,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            identifier: row.identifier,
            year: row.year,
            model: row.model,
            plate: Plate::parse(&row.plate)
                .map_err(|e| RentalError::Internal(format!("车辆 {} 车牌数据损坏: {e}", row.id)))?,
        })
    }
}

/// 车辆仓储
pub struct MotorcycleRepository {
    pool: PgPool,
}

impl MotorcycleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MotorcycleRepositoryTrait for MotorcycleRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Motorcycle>> {
        let row = sqlx::query_as::<_, MotorcycleRow>(
            r#"
            SELECT id, identifier, year, model, plate, version, created_at, updated_at
            FROM motorcycles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Motorcycle::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn exists_by_plate(&self, plate: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM motorcycles WHERE plate = $1)"#)
                .bind(plate)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<Motorcycle>> {
        Box::new(PgUnitOfWork::<Motorcycle>::new(self.pool.clone()))
    }
}

#[async_trait]
impl PgPersist for Motorcycle {
    async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO motorcycles (id, identifier, year, model, plate, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(self.meta.id)
        .bind(&self.identifier)
        .bind(self.year)
        .bind(&self.model)
        .bind(self.plate.as_str())
        .bind(self.meta.version)
        .bind(self.meta.created_at)
        .bind(self.meta.updated_at)
        .execute(conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            // 并发登记同一车牌时由唯一索引兜底
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => Err(
                RentalError::business(PLATE_EXISTS, format!("车牌 {} 已存在", self.plate)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, conn: &mut PgConnection) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE motorcycles
            SET identifier = $3, model = $4, updated_at = $5, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(self.meta.id)
        .bind(self.meta.version)
        .bind(&self.identifier)
        .bind(&self.model)
        .bind(self.meta.updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RentalError::ConcurrencyConflict {
                entity: "motorcycle",
                id: self.meta.id.to_string(),
            });
        }
        Ok(())
    }
}
