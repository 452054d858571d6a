//! 物品目录客户端
//!
//! 按物品分类（装备/消耗/设置/其他）查询售价、单价和堆叠上限。

use async_trait::async_trait;
use npc_shared::error::NpcError;
use npc_shared::rest::{Resource, RestClient};
use npc_shared::tenant::Tenant;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShopError};

/// 装备目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipableEntry {
    pub price: u32,
}

/// 消耗品目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumableEntry {
    pub price: u32,
    pub unit_price: f64,
    pub slot_max: u32,
    pub rechargeable: bool,
}

impl Default for ConsumableEntry {
    fn default() -> Self {
        Self {
            price: 0,
            unit_price: 1.0,
            slot_max: 1,
            rechargeable: false,
        }
    }
}

/// 设置类物品目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupEntry {
    pub price: u32,
    pub slot_max: u32,
}

/// 其他类物品目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcEntry {
    pub price: u32,
    pub unit_price: f64,
    pub slot_max: u32,
}

/// 可充值消耗品（飞镖、子弹）的目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeableCatalogEntry {
    pub template_id: u32,
    pub unit_price: f64,
    pub slot_max: u32,
}

/// 物品目录能力
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn equipable(&self, tenant: &Tenant, template_id: u32) -> Result<EquipableEntry>;

    async fn consumable(&self, tenant: &Tenant, template_id: u32) -> Result<ConsumableEntry>;

    async fn setup(&self, tenant: &Tenant, template_id: u32) -> Result<SetupEntry>;

    async fn etc(&self, tenant: &Tenant, template_id: u32) -> Result<EtcEntry>;

    /// 所有可充值的消耗品
    async fn rechargeable_consumables(
        &self,
        tenant: &Tenant,
    ) -> Result<Vec<RechargeableCatalogEntry>>;
}

// ---------------------------------------------------------------------------
// REST 实现
// ---------------------------------------------------------------------------

const RECHARGEABLE_QUERY: &str =
    "data/consumables?fields[consumables]=rechargeable,slotMax,unitPrice&filter[rechargeable]=true";

pub struct RestItemCatalog {
    rest: RestClient,
}

impl RestItemCatalog {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    async fn lookup<A: serde::de::DeserializeOwned + Send>(
        &self,
        tenant: &Tenant,
        resource: &str,
        template_id: u32,
    ) -> Result<A> {
        self.rest
            .get_one::<A>(tenant, &format!("data/{resource}/{template_id}"))
            .await
            .map(|r| r.attributes)
            .map_err(|e| match e {
                NpcError::NotFound { .. } => ShopError::CatalogEntryNotFound { template_id },
                other => ShopError::Shared(other),
            })
    }
}

#[async_trait]
impl ItemCatalog for RestItemCatalog {
    async fn equipable(&self, tenant: &Tenant, template_id: u32) -> Result<EquipableEntry> {
        self.lookup(tenant, "equipment", template_id).await
    }

    async fn consumable(&self, tenant: &Tenant, template_id: u32) -> Result<ConsumableEntry> {
        self.lookup(tenant, "consumables", template_id).await
    }

    async fn setup(&self, tenant: &Tenant, template_id: u32) -> Result<SetupEntry> {
        self.lookup(tenant, "setups", template_id).await
    }

    async fn etc(&self, tenant: &Tenant, template_id: u32) -> Result<EtcEntry> {
        self.lookup(tenant, "etcs", template_id).await
    }

    async fn rechargeable_consumables(
        &self,
        tenant: &Tenant,
    ) -> Result<Vec<RechargeableCatalogEntry>> {
        let resources = self
            .rest
            .get_many::<ConsumableEntry>(tenant, RECHARGEABLE_QUERY)
            .await?;

        resources
            .into_iter()
            .map(to_rechargeable_entry)
            .collect()
    }
}

fn to_rechargeable_entry(resource: Resource<ConsumableEntry>) -> Result<RechargeableCatalogEntry> {
    let template_id = resource
        .id
        .parse()
        .map_err(|_| ShopError::Collaborator(format!("无效的消耗品 ID: {}", resource.id)))?;

    Ok(RechargeableCatalogEntry {
        template_id,
        unit_price: resource.attributes.unit_price,
        slot_max: resource.attributes.slot_max,
    })
}
