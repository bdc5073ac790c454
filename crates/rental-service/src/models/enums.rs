//! 租赁服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use std::fmt;

use serde::{Deserialize, Serialize};

use super::money::Money;

/// 租赁套餐
///
/// 套餐决定租期天数、日租金和提前归还的罚金比例
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalPlan {
    Days7,
    Days15,
    Days30,
    Days45,
    Days50,
}

impl RentalPlan {
    pub const ALL: [RentalPlan; 5] = [
        RentalPlan::Days7,
        RentalPlan::Days15,
        RentalPlan::Days30,
        RentalPlan::Days45,
        RentalPlan::Days50,
    ];

    /// 套餐天数
    pub const fn days(self) -> i64 {
        match self {
            Self::Days7 => 7,
            Self::Days15 => 15,
            Self::Days30 => 30,
            Self::Days45 => 45,
            Self::Days50 => 50,
        }
    }

    /// 日租金
    pub const fn daily_rate(self) -> Money {
        match self {
            Self::Days7 => Money::from_units(30),
            Self::Days15 => Money::from_units(28),
            Self::Days30 => Money::from_units(22),
            Self::Days45 => Money::from_units(20),
            Self::Days50 => Money::from_units(18),
        }
    }

    /// 提前归还罚金比例（百分比），只有 7 天和 15 天套餐有罚金
    pub const fn penalty_rate_percent(self) -> i64 {
        match self {
            Self::Days7 => 20,
            Self::Days15 => 40,
            _ => 0,
        }
    }
}

impl fmt::Display for RentalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}天套餐", self.days())
    }
}

/// 租赁状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
    /// 租赁中
    #[default]
    Active,
    /// 已归还结算
    Completed,
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// 驾驶证类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
pub enum CnhType {
    /// 摩托车
    A,
    /// 汽车
    B,
    /// 摩托车与汽车
    AB,
}

impl CnhType {
    /// 是否允许驾驶摩托车
    pub fn allows_motorcycle(self) -> bool {
        matches!(self, Self::A | Self::AB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_table() {
        let table: Vec<_> = RentalPlan::ALL
            .iter()
            .map(|p| (p.days(), p.daily_rate().cents() / 100, p.penalty_rate_percent()))
            .collect();
        assert_eq!(
            table,
            vec![(7, 30, 20), (15, 28, 40), (30, 22, 0), (45, 20, 0), (50, 18, 0)]
        );
    }

    #[test]
    fn test_plan_serialization() {
        assert_eq!(serde_json::to_string(&RentalPlan::Days7).unwrap(), "\"DAYS7\"");
        let plan: RentalPlan = serde_json::from_str("\"DAYS50\"").unwrap();
        assert_eq!(plan, RentalPlan::Days50);
    }

    #[test]
    fn test_cnh_allows_motorcycle() {
        assert!(CnhType::A.allows_motorcycle());
        assert!(CnhType::AB.allows_motorcycle());
        assert!(!CnhType::B.allows_motorcycle());
        assert_eq!(serde_json::to_string(&CnhType::AB).unwrap(), "\"AB\"");
    }
}
