//! 商品持久化接口与内存实现
//!
//! 持久化本身由外部负责，服务只依赖 `CommodityRepository` trait。
//! `MemoryCommodityRepository` 用于本地运行与测试。

use async_trait::async_trait;
use dashmap::DashMap;
use npc_shared::error::NpcError;
use npc_shared::tenant::Tenant;
use uuid::Uuid;

use crate::error::{Result, ShopError};
use crate::shop::{Commodity, CommodityAttributes, Shop};

/// 商品持久化能力，所有操作都限定在租户内
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommodityRepository: Send + Sync {
    /// 读取未装饰的商店，不存在时返回 None
    async fn get_shop(&self, tenant: &Tenant, npc_id: u32) -> Result<Option<Shop>>;

    async fn list_shops(&self, tenant: &Tenant) -> Result<Vec<Shop>>;

    async fn list_by_npc(&self, tenant: &Tenant, npc_id: u32) -> Result<Vec<Commodity>>;

    /// 新建商店，已存在时返回错误
    async fn create_shop(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Result<Shop>;

    /// 整体替换商店的充值标记与全部商品，不存在时新建
    async fn replace_shop(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Result<Shop>;

    async fn create_commodity(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        attributes: CommodityAttributes,
    ) -> Result<Commodity>;

    async fn update_commodity(
        &self,
        tenant: &Tenant,
        commodity_id: Uuid,
        attributes: CommodityAttributes,
    ) -> Result<Commodity>;

    async fn delete_commodity(&self, tenant: &Tenant, commodity_id: Uuid) -> Result<()>;

    async fn delete_all_by_npc(&self, tenant: &Tenant, npc_id: u32) -> Result<()>;

    async fn delete_all(&self, tenant: &Tenant) -> Result<()>;
}

#[derive(Debug, Clone)]
struct ShopRecord {
    recharger: bool,
    commodities: Vec<Commodity>,
}

impl ShopRecord {
    fn to_shop(&self, npc_id: u32) -> Shop {
        Shop::new(npc_id, self.recharger, self.commodities.clone())
    }
}

fn build_commodities(attributes: Vec<CommodityAttributes>) -> Vec<Commodity> {
    attributes
        .into_iter()
        .map(|a| Commodity::new(Uuid::new_v4(), a))
        .collect()
}

/// 基于 DashMap 的内存仓库，键为 (租户 ID, NPC ID)
#[derive(Default)]
pub struct MemoryCommodityRepository {
    shops: DashMap<(Uuid, u32), ShopRecord>,
}

impl MemoryCommodityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommodityRepository for MemoryCommodityRepository {
    async fn get_shop(&self, tenant: &Tenant, npc_id: u32) -> Result<Option<Shop>> {
        Ok(self
            .shops
            .get(&(tenant.id, npc_id))
            .map(|record| record.to_shop(npc_id)))
    }

    async fn list_shops(&self, tenant: &Tenant) -> Result<Vec<Shop>> {
        let mut shops: Vec<Shop> = self
            .shops
            .iter()
            .filter(|entry| entry.key().0 == tenant.id)
            .map(|entry| entry.value().to_shop(entry.key().1))
            .collect();
        shops.sort_by_key(|s| s.npc_id);
        Ok(shops)
    }

    async fn list_by_npc(&self, tenant: &Tenant, npc_id: u32) -> Result<Vec<Commodity>> {
        Ok(self
            .shops
            .get(&(tenant.id, npc_id))
            .map(|record| record.commodities.clone())
            .unwrap_or_default())
    }

    async fn create_shop(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Result<Shop> {
        use dashmap::mapref::entry::Entry;

        match self.shops.entry((tenant.id, npc_id)) {
            Entry::Occupied(_) => Err(NpcError::AlreadyExists {
                entity: "Shop".to_string(),
                id: npc_id.to_string(),
            }
            .into()),
            Entry::Vacant(vacant) => {
                let record = ShopRecord {
                    recharger,
                    commodities: build_commodities(commodities),
                };
                let shop = record.to_shop(npc_id);
                vacant.insert(record);
                Ok(shop)
            }
        }
    }

    async fn replace_shop(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Result<Shop> {
        let record = ShopRecord {
            recharger,
            commodities: build_commodities(commodities),
        };
        let shop = record.to_shop(npc_id);
        self.shops.insert((tenant.id, npc_id), record);
        Ok(shop)
    }

    async fn create_commodity(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        attributes: CommodityAttributes,
    ) -> Result<Commodity> {
        let commodity = Commodity::new(Uuid::new_v4(), attributes);
        self.shops
            .entry((tenant.id, npc_id))
            .or_insert_with(|| ShopRecord {
                recharger: false,
                commodities: Vec::new(),
            })
            .commodities
            .push(commodity.clone());
        Ok(commodity)
    }

    async fn update_commodity(
        &self,
        tenant: &Tenant,
        commodity_id: Uuid,
        attributes: CommodityAttributes,
    ) -> Result<Commodity> {
        for mut entry in self.shops.iter_mut() {
            if entry.key().0 != tenant.id {
                continue;
            }
            if let Some(slot) = entry
                .value_mut()
                .commodities
                .iter_mut()
                .find(|c| c.id == commodity_id)
            {
                let updated = slot.clone().with_attributes(attributes);
                *slot = updated.clone();
                return Ok(updated);
            }
        }
        Err(ShopError::CommodityNotFound { commodity_id })
    }

    async fn delete_commodity(&self, tenant: &Tenant, commodity_id: Uuid) -> Result<()> {
        for mut entry in self.shops.iter_mut() {
            if entry.key().0 != tenant.id {
                continue;
            }
            let commodities = &mut entry.value_mut().commodities;
            if let Some(index) = commodities.iter().position(|c| c.id == commodity_id) {
                commodities.remove(index);
                return Ok(());
            }
        }
        Err(ShopError::CommodityNotFound { commodity_id })
    }

    async fn delete_all_by_npc(&self, tenant: &Tenant, npc_id: u32) -> Result<()> {
        if let Some(mut record) = self.shops.get_mut(&(tenant.id, npc_id)) {
            record.commodities.clear();
        }
        Ok(())
    }

    async fn delete_all(&self, tenant: &Tenant) -> Result<()> {
        self.shops.retain(|key, _| key.0 != tenant.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{other_tenant, test_tenant};

    #[tokio::test]
    async fn test_create_and_get_shop() {
        let repo = MemoryCommodityRepository::new();
        let tenant = test_tenant();

        repo.create_shop(&tenant, 2001, true, vec![CommodityAttributes::priced(4003001, 5000)])
            .await
            .unwrap();

        let shop = repo.get_shop(&tenant, 2001).await.unwrap().unwrap();
        assert!(shop.recharger);
        assert_eq!(shop.commodities.len(), 1);
        assert_eq!(shop.commodities[0].meso_price, 5000);

        let duplicate = repo.create_shop(&tenant, 2001, false, vec![]).await;
        assert!(matches!(
            duplicate,
            Err(ShopError::Shared(NpcError::AlreadyExists { .. }))
        ));
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let repo = MemoryCommodityRepository::new();
        repo.create_commodity(&test_tenant(), 2001, CommodityAttributes::priced(4003001, 10))
            .await
            .unwrap();

        assert!(repo.get_shop(&other_tenant(), 2001).await.unwrap().is_none());
        assert!(repo.list_shops(&other_tenant()).await.unwrap().is_empty());
        assert_eq!(repo.list_shops(&test_tenant()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shops_follow_tenant_id() {
        let repo = MemoryCommodityRepository::new();
        let upgraded = Tenant::new(test_tenant().id, "EMS", 90, 2);
        repo.create_shop(&test_tenant(), 2001, false, vec![])
            .await
            .unwrap();

        assert!(repo.get_shop(&upgraded, 2001).await.unwrap().is_some());
        repo.delete_all(&upgraded).await.unwrap();
        assert!(repo.list_shops(&test_tenant()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_commodity() {
        let repo = MemoryCommodityRepository::new();
        let tenant = test_tenant();
        let created = repo
            .create_commodity(&tenant, 2001, CommodityAttributes::priced(4003001, 10))
            .await
            .unwrap();

        let updated = repo
            .update_commodity(&tenant, created.id, CommodityAttributes::priced(4003001, 20))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(repo.list_by_npc(&tenant, 2001).await.unwrap()[0].meso_price, 20);

        repo.delete_commodity(&tenant, created.id).await.unwrap();
        assert!(repo.list_by_npc(&tenant, 2001).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_commodity(&tenant, created.id).await,
            Err(ShopError::CommodityNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_replace_shop_drops_previous_commodities() {
        let repo = MemoryCommodityRepository::new();
        let tenant = test_tenant();
        repo.create_shop(&tenant, 2001, false, vec![CommodityAttributes::priced(4003001, 10)])
            .await
            .unwrap();

        let shop = repo
            .replace_shop(&tenant, 2001, true, vec![CommodityAttributes::priced(4003002, 30)])
            .await
            .unwrap();

        assert!(shop.recharger);
        let listed = repo.list_by_npc(&tenant, 2001).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].template_id, 4003002);
    }

    #[tokio::test]
    async fn test_delete_all_only_touches_tenant() {
        let repo = MemoryCommodityRepository::new();
        repo.create_shop(&test_tenant(), 2001, false, vec![]).await.unwrap();
        repo.create_shop(&other_tenant(), 2001, false, vec![]).await.unwrap();

        repo.delete_all(&test_tenant()).await.unwrap();

        assert!(repo.get_shop(&test_tenant(), 2001).await.unwrap().is_none());
        assert!(repo.get_shop(&other_tenant(), 2001).await.unwrap().is_some());
    }
}
