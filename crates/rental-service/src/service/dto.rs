//! 服务层数据传输对象

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rental_shared::persistence::Entity;

use crate::models::{Money, Motorcycle, Rental, RentalPlan, RentalStatus};
use crate::pricing::{ReturnKind, ReturnQuote};

/// 创建租赁请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRentalRequest {
    pub driver_id: Uuid,
    pub motorcycle_id: Uuid,
    pub plan: RentalPlan,
    pub start_date: NaiveDate,
}

/// 租赁详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalView {
    pub id: Uuid,
    pub motorcycle_id: Uuid,
    pub driver_id: Uuid,
    pub plan: RentalPlan,
    pub start_date: NaiveDate,
    pub expected_end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub daily_rate: Money,
    pub total_amount: Money,
    pub status: RentalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<Money>,
}

impl From<&Rental> for RentalView {
    fn from(rental: &Rental) -> Self {
        let settlement = rental.settlement();
        Self {
            id: rental.id(),
            motorcycle_id: rental.motorcycle_id(),
            driver_id: rental.driver_id(),
            plan: rental.plan(),
            start_date: rental.period().start_date,
            expected_end_date: rental.period().expected_end_date,
            end_date: rental.period().end_date,
            daily_rate: rental.daily_rate(),
            total_amount: rental.total_amount(),
            status: rental.status(),
            return_date: settlement.map(|s| s.return_date),
            penalty_amount: settlement.map(|s| s.penalty),
            additional_amount: settlement.map(|s| s.additional),
            final_amount: settlement.map(|s| s.final_amount),
        }
    }
}

/// 归还模拟结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnSimulationView {
    pub return_date: NaiveDate,
    /// 实际使用天数
    pub total_days: i64,
    pub daily_rate: Money,
    pub base_amount: Money,
    pub penalty: Money,
    pub additional: Money,
    pub final_amount: Money,
    pub message: String,
}

impl ReturnSimulationView {
    pub fn from_quote(quote: &ReturnQuote, daily_rate: Money) -> Self {
        let message = match quote.kind() {
            ReturnKind::Early => format!("early return, penalty {}", quote.penalty),
            ReturnKind::Late => format!("late return, additional {}", quote.additional),
            ReturnKind::OnTime => "returned on the expected date".to_string(),
        };

        Self {
            return_date: quote.return_date,
            total_days: quote.actual_days,
            daily_rate,
            base_amount: quote.base_amount(daily_rate),
            penalty: quote.penalty,
            additional: quote.additional,
            final_amount: quote.final_amount,
            message,
        }
    }
}

/// 登记车辆请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMotorcycleRequest {
    pub identifier: String,
    pub year: i32,
    pub model: String,
    pub plate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotorcycleView {
    pub id: Uuid,
    pub identifier: String,
    pub year: i32,
    pub model: String,
    pub plate: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Motorcycle> for MotorcycleView {
    fn from(m: &Motorcycle) -> Self {
        Self {
            id: m.meta.id,
            identifier: m.identifier.clone(),
            year: m.year,
            model: m.model.clone(),
            plate: m.plate.to_string(),
            created_at: m.meta.created_at,
        }
    }
}
