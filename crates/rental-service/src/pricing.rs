//! 租金结算
//!
//! 根据套餐、起租日和实际归还日计算罚金、超期费用与最终金额。
//! 纯函数，不依赖任何外部状态。

use chrono::NaiveDate;
use serde::Serialize;

use rental_shared::error::{RentalError, Result};

use crate::models::{Money, RentalPlan};

/// 超期每日附加费
pub const LATE_FEE_PER_DAY: Money = Money::from_units(50);

/// 归还类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Early,
    OnTime,
    Late,
}

impl ReturnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::OnTime => "on_time",
            Self::Late => "late",
        }
    }
}

/// 归还结算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnQuote {
    pub return_date: NaiveDate,
    /// 实际使用天数（归还日 - 起租日）
    pub actual_days: i64,
    pub expected_days: i64,
    pub penalty: Money,
    pub additional: Money,
    pub final_amount: Money,
}

impl ReturnQuote {
    pub fn kind(&self) -> ReturnKind {
        match self.actual_days.cmp(&self.expected_days) {
            std::cmp::Ordering::Less => ReturnKind::Early,
            std::cmp::Ordering::Equal => ReturnKind::OnTime,
            std::cmp::Ordering::Greater => ReturnKind::Late,
        }
    }

    /// 按实际天数计算的基础租金
    pub fn base_amount(&self, daily_rate: Money) -> Money {
        daily_rate.times(self.actual_days)
    }
}

/// 计算归还结算
///
/// - 提前归还：实际天数 * 日租金 + 未使用天数 * 日租金 * 罚金比例
/// - 按期归还：套餐总价
/// - 超期归还：套餐总价 + 超期天数 * 50
///
/// 归还日早于起租日时返回校验错误。
pub fn compute_return(
    plan: RentalPlan,
    start_date: NaiveDate,
    daily_rate: Money,
    total_amount: Money,
    return_date: NaiveDate,
) -> Result<ReturnQuote> {
    let actual_days = (return_date - start_date).num_days();
    if actual_days < 0 {
        return Err(RentalError::Validation(format!(
            "归还日期 {} 早于起租日期 {}",
            return_date, start_date
        )));
    }

    let expected_days = plan.days();
    let (penalty, additional, final_amount) = if actual_days < expected_days {
        let unused_days = expected_days - actual_days;
        let penalty = daily_rate
            .times(unused_days)
            .percent(plan.penalty_rate_percent());
        (penalty, Money::ZERO, daily_rate.times(actual_days) + penalty)
    } else if actual_days > expected_days {
        let additional = LATE_FEE_PER_DAY.times(actual_days - expected_days);
        (Money::ZERO, additional, total_amount + additional)
    } else {
        (Money::ZERO, Money::ZERO, total_amount)
    };

    Ok(ReturnQuote {
        return_date,
        actual_days,
        expected_days,
        penalty,
        additional,
        final_amount,
    })
}
