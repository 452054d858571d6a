//! 角色与背包模型
//!
//! 只保留交易所需的字段：金币、世界 ID、等级以及各背包分类的格子内容。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 背包分类，由物品模板 ID 的百万位决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum InventoryType {
    Equip,
    Use,
    Setup,
    Etc,
    Cash,
}

impl InventoryType {
    /// `template_id / 1_000_000`：1 装备、2 消耗、3 设置、4 其他、5 现金
    pub fn from_template_id(template_id: u32) -> Option<Self> {
        u8::try_from(template_id / 1_000_000)
            .ok()
            .and_then(|v| Self::from_byte(v).ok())
    }

    pub fn from_byte(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(Self::Equip),
            2 => Ok(Self::Use),
            3 => Ok(Self::Setup),
            4 => Ok(Self::Etc),
            5 => Ok(Self::Cash),
            other => Err(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Equip => 1,
            Self::Use => 2,
            Self::Setup => 3,
            Self::Etc => 4,
            Self::Cash => 5,
        }
    }
}

impl From<InventoryType> for u8 {
    fn from(value: InventoryType) -> Self {
        value.as_byte()
    }
}

impl TryFrom<u8> for InventoryType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_byte(value).map_err(|v| format!("无效的背包类型: {v}"))
    }
}

impl fmt::Display for InventoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Equip => "equip",
            Self::Use => "use",
            Self::Setup => "setup",
            Self::Etc => "etc",
            Self::Cash => "cash",
        };
        f.write_str(name)
    }
}

/// 背包格子中的一组物品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub slot: i16,
    pub template_id: u32,
    pub quantity: u32,
}

/// 单个背包分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compartment {
    #[serde(rename = "type")]
    pub inventory_type: InventoryType,
    pub capacity: u32,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Compartment {
    pub fn find_by_slot(&self, slot: i16) -> Option<&Asset> {
        self.assets.iter().find(|a| a.slot == slot)
    }

    /// 最小的空闲格子；负数格子（已穿戴）不占用背包容量
    pub fn next_free_slot(&self) -> Option<i16> {
        let capacity = i16::try_from(self.capacity).unwrap_or(i16::MAX);
        (1..=capacity).find(|slot| self.find_by_slot(*slot).is_none())
    }
}

/// 角色背包
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub compartments: Vec<Compartment>,
}

impl Inventory {
    pub fn compartment(&self, inventory_type: InventoryType) -> Option<&Compartment> {
        self.compartments
            .iter()
            .find(|c| c.inventory_type == inventory_type)
    }
}

/// 带背包信息的角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: u32,
    pub world_id: u8,
    pub meso: u32,
    pub inventory: Inventory,
}

impl Character {
    pub fn compartment(&self, inventory_type: InventoryType) -> Option<&Compartment> {
        self.inventory.compartment(inventory_type)
    }
}
