//! 金额类型
//!
//! 以分为单位的整数金额，避免浮点误差。

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// 金额（分）
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// 按整数元构造
    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// 乘以整数倍（天数等）
    pub const fn times(self, factor: i64) -> Self {
        Self(self.0 * factor)
    }

    /// 取百分比，向零取整到分
    pub const fn percent(self, pct: i64) -> Self {
        Self(self.0 * pct / 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
