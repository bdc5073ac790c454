//! 租赁仓储

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use rental_shared::persistence::{Entity, EntityMeta, PgPersist, PgUnitOfWork, UnitOfWork};

use super::UNIQUE_VIOLATION;
use super::traits::RentalRepositoryTrait;
use crate::error::{RentalError, Result};
use crate::models::{Money, Rental, RentalPeriod, RentalPlan, RentalStatus, ReturnSettlement};
use crate::service::codes;

const RENTAL_COLUMNS: &str = r#"
    id, motorcycle_id, driver_id, plan, start_date, expected_end_date, end_date,
    daily_rate, total_amount, status, return_date, penalty_amount, additional_amount,
    final_amount, version, created_at, updated_at
"#;

/// 进行中租赁的部分唯一索引对应的业务错误码
fn active_rental_conflict(constraint: Option<&str>) -> Option<&'static str> {
    match constraint? {
        "idx_rentals_active_driver" => Some(codes::DRIVER_HAS_ACTIVE_RENTAL),
        "idx_rentals_active_motorcycle" => Some(codes::MOTORCYCLE_UNAVAILABLE),
        _ => None,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RentalRow {
    id: Uuid,
    motorcycle_id: Uuid,
    driver_id: Uuid,
    plan: RentalPlan,
    start_date: NaiveDate,
    expected_end_date: NaiveDate,
    end_date: Option<NaiveDate>,
    daily_rate: Money,
    total_amount: Money,
    status: RentalStatus,
    return_date: Option<DateTime<Utc>>,
    penalty_amount: Option<Money>,
    additional_amount: Option<Money>,
    final_amount: Option<Money>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RentalRow> for Rental {
    type Error = RentalError;

    fn try_from(row: RentalRow) -> Result<Self> {
        let settlement = match (row.return_date, row.penalty_amount, row.additional_amount, row.final_amount) {
            (Some(return_date), Some(penalty), Some(additional), Some(final_amount)) => {
                Some(ReturnSettlement {
                    return_date,
                    penalty,
                    additional,
                    final_amount,
                })
            }
            _ => None,
        };

        Rental::restore(
            EntityMeta {
                id: row.id,
                version: row.version,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            row.motorcycle_id,
            row.driver_id,
            row.plan,
            RentalPeriod {
                start_date: row.start_date,
                expected_end_date: row.expected_end_date,
                end_date: row.end_date,
            },
            row.daily_rate,
            row.total_amount,
            row.status,
            settlement,
        )
    }
}

/// 租赁仓储
pub struct RentalRepository {
    pool: PgPool,
}

impl RentalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, condition: &str, id: Uuid) -> Result<Option<Rental>> {
        let sql = format!("SELECT {RENTAL_COLUMNS} FROM rentals WHERE {condition} LIMIT 1");
        let row = sqlx::query_as::<_, RentalRow>(&sql)
            .bind(id)
            .bind(RentalStatus::Active)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Rental::try_from).transpose()
    }
}

#[async_trait]
impl RentalRepositoryTrait for RentalRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Rental>> {
        let sql = format!("SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = $1");
        let row = sqlx::query_as::<_, RentalRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Rental::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Rental>> {
        let sql = format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals WHERE driver_id = $1 ORDER BY start_date DESC, created_at DESC"
        );
        let rows = sqlx::query_as::<_, RentalRow>(&sql)
            .bind(driver_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Rental::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn find_active_by_driver(&self, driver_id: Uuid) -> Result<Option<Rental>> {
        self.fetch_one_where("driver_id = $1 AND status = $2", driver_id)
            .await
    }

    #[instrument(skip(self))]
    async fn find_active_by_motorcycle(&self, motorcycle_id: Uuid) -> Result<Option<Rental>> {
        self.fetch_one_where("motorcycle_id = $1 AND status = $2", motorcycle_id)
            .await
    }

    fn unit_of_work(&self) -> Box<dyn UnitOfWork<Rental>> {
        Box::new(PgUnitOfWork::<Rental>::new(self.pool.clone()))
    }
}

#[async_trait]
impl PgPersist for Rental {
    async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        let settlement = self.settlement();
        let result = sqlx::query(
            r#"
            INSERT INTO rentals (
                id, motorcycle_id, driver_id, plan, start_date, expected_end_date, end_date,
                daily_rate, total_amount, status, return_date, penalty_amount, additional_amount,
                final_amount, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(self.meta().id)
        .bind(self.motorcycle_id())
        .bind(self.driver_id())
        .bind(self.plan())
        .bind(self.period().start_date)
        .bind(self.period().expected_end_date)
        .bind(self.period().end_date)
        .bind(self.daily_rate())
        .bind(self.total_amount())
        .bind(self.status())
        .bind(settlement.map(|s| s.return_date))
        .bind(settlement.map(|s| s.penalty))
        .bind(settlement.map(|s| s.additional))
        .bind(settlement.map(|s| s.final_amount))
        .bind(self.meta().version)
        .bind(self.meta().created_at)
        .bind(self.meta().updated_at)
        .execute(conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            // 并发创建时由部分唯一索引兜底
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                match active_rental_conflict(db.constraint()) {
                    Some(code) => Err(RentalError::business(
                        code,
                        format!("租赁 {} 与进行中的租赁冲突", self.meta().id),
                    )),
                    None => Err(sqlx::Error::Database(db).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, conn: &mut PgConnection) -> Result<()> {
        let settlement = self.settlement();
        let result = sqlx::query(
            r#"
            UPDATE rentals
            SET end_date = $3, status = $4, return_date = $5, penalty_amount = $6,
                additional_amount = $7, final_amount = $8, updated_at = $9,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(self.meta().id)
        .bind(self.meta().version)
        .bind(self.period().end_date)
        .bind(self.status())
        .bind(settlement.map(|s| s.return_date))
        .bind(settlement.map(|s| s.penalty))
        .bind(settlement.map(|s| s.additional))
        .bind(settlement.map(|s| s.final_amount))
        .bind(self.meta().updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RentalError::ConcurrencyConflict {
                entity: "rental",
                id: self.meta().id.to_string(),
            });
        }
        Ok(())
    }
}
