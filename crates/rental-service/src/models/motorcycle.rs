//! 车辆聚合

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use rental_shared::error::{RentalError, Result};
use rental_shared::events::MotorcycleCreatedEvent;
use rental_shared::persistence::{Entity, EntityMeta};

/// 车牌格式：三位字母 + 一位数字 + 一位字母或数字 + 两位数字
static PLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{3}[0-9][A-Z0-9][0-9]{2}$").unwrap_or_else(|e| panic!("车牌正则非法: {e}"))
});

/// 最早允许登记的出厂年份
pub const MIN_YEAR: i32 = 1900;

/// 车牌
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    /// 解析车牌，去除首尾空白并转为大写后校验格式
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(RentalError::Validation("车牌不能为空".to_string()));
        }
        if !PLATE_PATTERN.is_match(&normalized) {
            return Err(RentalError::Validation(format!("车牌格式非法: {raw}")));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Plate {
    type Error = RentalError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(plate: Plate) -> Self {
        plate.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 车辆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motorcycle {
    pub meta: EntityMeta,
    pub identifier: String,
    pub year: i32,
    pub model: String,
    pub plate: Plate,
}

impl Motorcycle {
    /// 创建车辆，出厂年份必须在 [1900, current_year + 1] 内
    pub fn new(identifier: &str, year: i32, model: &str, plate: &str, current_year: i32) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(RentalError::Validation("车辆标识不能为空".to_string()));
        }
        let model = model.trim();
        if model.is_empty() {
            return Err(RentalError::Validation("车型不能为空".to_string()));
        }
        if !(MIN_YEAR..=current_year + 1).contains(&year) {
            return Err(RentalError::Validation(format!(
                "出厂年份必须在 {} 到 {} 之间",
                MIN_YEAR,
                current_year + 1
            )));
        }

        Ok(Self {
            meta: EntityMeta::new(),
            identifier: identifier.to_string(),
            year,
            model: model.to_string(),
            plate: Plate::parse(plate)?,
        })
    }

    /// 生成登记事件
    pub fn created_event(&self) -> MotorcycleCreatedEvent {
        MotorcycleCreatedEvent::new(
            self.meta.id,
            self.identifier.clone(),
            self.year,
            self.model.clone(),
            self.plate.to_string(),
        )
    }
}

impl Entity for Motorcycle {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
