//! 租赁聚合
//!
//! 租赁创建后处于 Active 状态，归还结算后进入 Completed，不可逆。
//! 结算字段（归还时间、罚金、附加费、最终金额）作为一个整体存在，
//! 只在 Completed 状态下出现。

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rental_shared::error::{RentalError, Result};
use rental_shared::persistence::{Entity, EntityMeta};

use super::enums::{RentalPlan, RentalStatus};
use super::money::Money;
use crate::pricing::{self, ReturnQuote};

/// 租期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalPeriod {
    pub start_date: NaiveDate,
    pub expected_end_date: NaiveDate,
    /// 实际结束日期，归还后写入
    pub end_date: Option<NaiveDate>,
}

impl RentalPeriod {
    pub fn for_plan(start_date: NaiveDate, plan: RentalPlan) -> Self {
        Self {
            start_date,
            expected_end_date: start_date + Duration::days(plan.days()),
            end_date: None,
        }
    }

    /// 计划租期天数
    pub fn total_days(&self) -> i64 {
        (self.expected_end_date - self.start_date).num_days()
    }
}

/// 归还结算信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSettlement {
    pub return_date: DateTime<Utc>,
    pub penalty: Money,
    pub additional: Money,
    pub final_amount: Money,
}

/// 租赁
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    meta: EntityMeta,
    motorcycle_id: Uuid,
    driver_id: Uuid,
    plan: RentalPlan,
    period: RentalPeriod,
    daily_rate: Money,
    total_amount: Money,
    status: RentalStatus,
    settlement: Option<ReturnSettlement>,
}

impl Rental {
    /// 创建新租赁，日租金与总价由套餐决定
    pub fn new(motorcycle_id: Uuid, driver_id: Uuid, plan: RentalPlan, start_date: NaiveDate) -> Self {
        let daily_rate = plan.daily_rate();
        Self {
            meta: EntityMeta::new(),
            motorcycle_id,
            driver_id,
            plan,
            period: RentalPeriod::for_plan(start_date, plan),
            daily_rate,
            total_amount: daily_rate.times(plan.days()),
            status: RentalStatus::Active,
            settlement: None,
        }
    }

    /// 从持久化数据还原，校验状态与结算信息是否一致
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        meta: EntityMeta,
        motorcycle_id: Uuid,
        driver_id: Uuid,
        plan: RentalPlan,
        period: RentalPeriod,
        daily_rate: Money,
        total_amount: Money,
        status: RentalStatus,
        settlement: Option<ReturnSettlement>,
    ) -> Result<Self> {
        match (status, settlement.is_some()) {
            (RentalStatus::Active, false) | (RentalStatus::Completed, true) => Ok(Self {
                meta,
                motorcycle_id,
                driver_id,
                plan,
                period,
                daily_rate,
                total_amount,
                status,
                settlement,
            }),
            _ => Err(RentalError::Internal(format!(
                "租赁 {} 数据不一致: 状态 {} 与结算信息不匹配",
                meta.id, status
            ))),
        }
    }

    pub fn motorcycle_id(&self) -> Uuid {
        self.motorcycle_id
    }

    pub fn driver_id(&self) -> Uuid {
        self.driver_id
    }

    pub fn plan(&self) -> RentalPlan {
        self.plan
    }

    pub fn period(&self) -> &RentalPeriod {
        &self.period
    }

    pub fn daily_rate(&self) -> Money {
        self.daily_rate
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> RentalStatus {
        self.status
    }

    pub fn settlement(&self) -> Option<&ReturnSettlement> {
        self.settlement.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(RentalError::InvalidState(format!(
                "租赁 {} 当前状态为 {}，无法归还",
                self.meta.id, self.status
            )))
        }
    }

    fn quote(&self, return_date: DateTime<Utc>) -> Result<ReturnQuote> {
        pricing::compute_return(
            self.plan,
            self.period.start_date,
            self.daily_rate,
            self.total_amount,
            return_date.date_naive(),
        )
    }

    /// 模拟归还，不修改任何状态
    pub fn simulate_return(&self, return_date: DateTime<Utc>) -> Result<ReturnQuote> {
        self.ensure_active()?;
        self.quote(return_date)
    }

    /// 执行归还结算
    ///
    /// 结算信息与状态切换同时写入；任何一步失败时租赁保持原样。
    pub fn process_return(&mut self, return_date: DateTime<Utc>) -> Result<ReturnQuote> {
        self.ensure_active()?;
        let quote = self.quote(return_date)?;

        self.settlement = Some(ReturnSettlement {
            return_date,
            penalty: quote.penalty,
            additional: quote.additional,
            final_amount: quote.final_amount,
        });
        self.period.end_date = Some(quote.return_date);
        self.status = RentalStatus::Completed;
        self.meta.touch();

        Ok(quote)
    }
}

impl Entity for Rental {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
