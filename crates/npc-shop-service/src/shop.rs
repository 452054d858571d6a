//! 商店与商品模型
//!
//! 商店和商品都按值传递，任何变换都产生新值而不原地修改。
//! `unit_price` / `slot_max` 是派生字段，每次读取时由装饰步骤根据物品目录重新计算，
//! 存储层的值不可信。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 派生字段在装饰前的默认值
pub const DEFAULT_UNIT_PRICE: f64 = 1.0;
pub const DEFAULT_SLOT_MAX: u32 = 1;

/// 商品的可持久化属性（创建/更新时由管理端提供）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommodityAttributes {
    pub template_id: u32,
    pub meso_price: u32,
    pub discount_rate: u8,
    pub token_template_id: u32,
    pub token_price: u32,
    pub period: u32,
    pub level_limit: u32,
}

impl CommodityAttributes {
    pub fn priced(template_id: u32, meso_price: u32) -> Self {
        Self {
            template_id,
            meso_price,
            ..Default::default()
        }
    }
}

/// 商店中的一条商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commodity {
    pub id: Uuid,
    pub template_id: u32,
    pub meso_price: u32,
    pub discount_rate: u8,
    pub token_template_id: u32,
    pub token_price: u32,
    pub period: u32,
    pub level_limit: u32,
    pub unit_price: f64,
    pub slot_max: u32,
}

impl Commodity {
    pub fn new(id: Uuid, attributes: CommodityAttributes) -> Self {
        Self {
            id,
            template_id: attributes.template_id,
            meso_price: attributes.meso_price,
            discount_rate: attributes.discount_rate,
            token_template_id: attributes.token_template_id,
            token_price: attributes.token_price,
            period: attributes.period,
            level_limit: attributes.level_limit,
            unit_price: DEFAULT_UNIT_PRICE,
            slot_max: DEFAULT_SLOT_MAX,
        }
    }

    /// 为目录中的可充值物品合成一条零价商品
    pub fn synthesized(template_id: u32, unit_price: f64, slot_max: u32) -> Self {
        Self::new(Uuid::new_v4(), CommodityAttributes::priced(template_id, 0))
            .with_derived(unit_price, slot_max)
    }

    /// 返回替换了派生字段的新商品
    pub fn with_derived(self, unit_price: f64, slot_max: u32) -> Self {
        Self {
            unit_price,
            slot_max,
            ..self
        }
    }

    /// 返回以新属性覆盖持久化字段的新商品，保留 id 与派生字段
    pub fn with_attributes(self, attributes: CommodityAttributes) -> Self {
        Self {
            template_id: attributes.template_id,
            meso_price: attributes.meso_price,
            discount_rate: attributes.discount_rate,
            token_template_id: attributes.token_template_id,
            token_price: attributes.token_price,
            period: attributes.period,
            level_limit: attributes.level_limit,
            ..self
        }
    }

    pub fn attributes(&self) -> CommodityAttributes {
        CommodityAttributes {
            template_id: self.template_id,
            meso_price: self.meso_price,
            discount_rate: self.discount_rate,
            token_template_id: self.token_template_id,
            token_price: self.token_price,
            period: self.period,
            level_limit: self.level_limit,
        }
    }
}

/// NPC 商店
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub npc_id: u32,
    pub recharger: bool,
    pub commodities: Vec<Commodity>,
}

impl Shop {
    pub fn new(npc_id: u32, recharger: bool, commodities: Vec<Commodity>) -> Self {
        Self {
            npc_id,
            recharger,
            commodities,
        }
    }

    pub fn with_commodities(self, commodities: Vec<Commodity>) -> Self {
        Self {
            commodities,
            ..self
        }
    }

    pub fn find_by_template(&self, template_id: u32) -> Option<&Commodity> {
        self.commodities
            .iter()
            .find(|c| c.template_id == template_id)
    }
}
