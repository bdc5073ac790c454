//! 骑手

use serde::{Deserialize, Serialize};

use rental_shared::persistence::{Entity, EntityMeta};

use super::enums::CnhType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub meta: EntityMeta,
    pub identifier: String,
    pub name: String,
    pub cnh_type: CnhType,
}

impl Driver {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, cnh_type: CnhType) -> Self {
        Self {
            meta: EntityMeta::new(),
            identifier: identifier.into(),
            name: name.into(),
            cnh_type,
        }
    }

    /// 只有 A 或 AB 类驾驶证可以租赁摩托车
    pub fn can_rent(&self) -> bool {
        self.cnh_type.allows_motorcycle()
    }
}

impl Entity for Driver {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
