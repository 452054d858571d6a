//! 商店装饰步骤
//!
//! 持久化的商店只包含商品的基础属性，读取时依次经过以下步骤得到有效商品列表：
//! 1. `CatalogPricingEnricher`：按物品分类从目录重新计算每个商品的单价和堆叠上限
//! 2. `CommodityDecorator`：对可充值商店，用缓存的可充值目录覆盖派生字段，
//!    并为未上架的可充值物品合成零价商品
//!
//! 每个步骤都实现 `ShopEnricher`，接收一个商店值并返回新的商店值。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use npc_shared::tenant::Tenant;
use tracing::{debug, warn};

use crate::catalog::ItemCatalog;
use crate::consumable_cache::ConsumableCache;
use crate::inventory::InventoryType;
use crate::shop::{Commodity, DEFAULT_SLOT_MAX, DEFAULT_UNIT_PRICE, Shop};

#[async_trait]
pub trait ShopEnricher: Send + Sync {
    async fn enrich(&self, tenant: &Tenant, shop: Shop) -> Shop;
}

/// 按顺序执行的装饰步骤
#[derive(Clone, Default)]
pub struct EnrichmentPipeline {
    steps: Vec<Arc<dyn ShopEnricher>>,
}

impl EnrichmentPipeline {
    pub fn new(steps: Vec<Arc<dyn ShopEnricher>>) -> Self {
        Self { steps }
    }

    /// 目录定价 + 可充值商品装饰的标准组合
    pub fn standard(catalog: Arc<dyn ItemCatalog>, cache: Arc<ConsumableCache>) -> Self {
        Self::new(vec![
            Arc::new(CatalogPricingEnricher::new(catalog)),
            Arc::new(CommodityDecorator::new(cache)),
        ])
    }

    pub async fn enrich(&self, tenant: &Tenant, shop: Shop) -> Shop {
        let mut shop = shop;
        for step in &self.steps {
            shop = step.enrich(tenant, shop).await;
        }
        shop
    }
}

// ---------------------------------------------------------------------------
// 目录定价
// ---------------------------------------------------------------------------

pub struct CatalogPricingEnricher {
    catalog: Arc<dyn ItemCatalog>,
}

impl CatalogPricingEnricher {
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        Self { catalog }
    }

    /// 计算单个商品的 (unit_price, slot_max)，目录查询失败时使用默认值
    async fn derived_fields(&self, tenant: &Tenant, template_id: u32) -> (f64, u32) {
        let defaults = (DEFAULT_UNIT_PRICE, DEFAULT_SLOT_MAX);
        let result = match InventoryType::from_template_id(template_id) {
            Some(InventoryType::Equip) => return defaults,
            Some(InventoryType::Use) => self
                .catalog
                .consumable(tenant, template_id)
                .await
                .map(|c| (c.unit_price, c.slot_max)),
            Some(InventoryType::Setup) => self
                .catalog
                .setup(tenant, template_id)
                .await
                .map(|s| (DEFAULT_UNIT_PRICE, s.slot_max)),
            Some(InventoryType::Etc) => self
                .catalog
                .etc(tenant, template_id)
                .await
                .map(|e| (e.unit_price, e.slot_max)),
            Some(InventoryType::Cash) | None => return defaults,
        };

        result.unwrap_or_else(|e| {
            warn!(template_id, error = %e, "查询物品目录失败，使用默认定价");
            defaults
        })
    }
}

#[async_trait]
impl ShopEnricher for CatalogPricingEnricher {
    async fn enrich(&self, tenant: &Tenant, shop: Shop) -> Shop {
        let derived = join_all(
            shop.commodities
                .iter()
                .map(|c| self.derived_fields(tenant, c.template_id)),
        )
        .await;

        let commodities = shop
            .commodities
            .iter()
            .cloned()
            .zip(derived)
            .map(|(c, (unit_price, slot_max))| c.with_derived(unit_price, slot_max))
            .collect();

        shop.with_commodities(commodities)
    }
}

// ---------------------------------------------------------------------------
// 可充值商品
// ---------------------------------------------------------------------------

pub struct CommodityDecorator {
    cache: Arc<ConsumableCache>,
}

impl CommodityDecorator {
    pub fn new(cache: Arc<ConsumableCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ShopEnricher for CommodityDecorator {
    async fn enrich(&self, tenant: &Tenant, shop: Shop) -> Shop {
        if !shop.recharger {
            return shop;
        }

        let rechargeables = self.cache.get_consumables(tenant).await;
        let by_template: HashMap<u32, _> = rechargeables
            .iter()
            .map(|r| (r.template_id, r))
            .collect();

        let mut listed = HashSet::new();
        let mut commodities: Vec<Commodity> = shop
            .commodities
            .iter()
            .cloned()
            .map(|c| {
                listed.insert(c.template_id);
                match by_template.get(&c.template_id) {
                    Some(r) => c.with_derived(r.unit_price, r.slot_max),
                    None => c,
                }
            })
            .collect();

        let before = commodities.len();
        commodities.extend(
            rechargeables
                .iter()
                .filter(|r| !listed.contains(&r.template_id))
                .map(|r| Commodity::synthesized(r.template_id, r.unit_price, r.slot_max)),
        );
        debug!(
            npc_id = shop.npc_id,
            synthesized = commodities.len() - before,
            "已装饰可充值商品"
        );

        shop.with_commodities(commodities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConsumableEntry, EtcEntry, MockItemCatalog, RechargeableCatalogEntry, SetupEntry};
    use crate::error::ShopError;
    use crate::shop::CommodityAttributes;
    use crate::test_utils::test_tenant;
    use uuid::Uuid;

    fn commodity(template_id: u32, meso_price: u32) -> Commodity {
        Commodity::new(Uuid::new_v4(), CommodityAttributes::priced(template_id, meso_price))
    }

    fn decorator_with(entries: Vec<RechargeableCatalogEntry>) -> CommodityDecorator {
        let cache = ConsumableCache::new(Arc::new(MockItemCatalog::new()));
        cache.set_consumables(&test_tenant(), entries);
        CommodityDecorator::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn test_non_recharger_is_unchanged() {
        let decorator = decorator_with(vec![RechargeableCatalogEntry {
            template_id: 9999,
            unit_price: 1.5,
            slot_max: 200,
        }]);
        let shop = Shop::new(2001, false, vec![commodity(4003001, 5000)]);

        let decorated = decorator.enrich(&test_tenant(), shop.clone()).await;
        assert_eq!(decorated, shop);
    }

    #[tokio::test]
    async fn test_synthesizes_missing_rechargeable() {
        let decorator = decorator_with(vec![RechargeableCatalogEntry {
            template_id: 9999,
            unit_price: 1.5,
            slot_max: 200,
        }]);
        let persisted = commodity(4003001, 5000);
        let shop = Shop::new(2001, true, vec![persisted.clone()]);

        let decorated = decorator.enrich(&test_tenant(), shop).await;

        assert_eq!(decorated.commodities.len(), 2);
        assert_eq!(decorated.commodities[0], persisted);
        let synthesized = decorated.find_by_template(9999).unwrap();
        assert_eq!(synthesized.meso_price, 0);
        assert_eq!(synthesized.unit_price, 1.5);
        assert_eq!(synthesized.slot_max, 200);
    }

    #[tokio::test]
    async fn test_listed_rechargeable_keeps_price_and_takes_catalog_capacity() {
        let decorator = decorator_with(vec![RechargeableCatalogEntry {
            template_id: 2070000,
            unit_price: 2.0,
            slot_max: 800,
        }]);
        let listed = commodity(2070000, 500);
        let shop = Shop::new(2001, true, vec![listed.clone()]);

        let decorated = decorator.enrich(&test_tenant(), shop).await;

        assert_eq!(decorated.commodities.len(), 1);
        let c = &decorated.commodities[0];
        assert_eq!(c.id, listed.id);
        assert_eq!(c.meso_price, 500);
        assert_eq!(c.unit_price, 2.0);
        assert_eq!(c.slot_max, 800);
    }

    #[tokio::test]
    async fn test_decoration_is_idempotent() {
        let decorator = decorator_with(vec![
            RechargeableCatalogEntry {
                template_id: 2070000,
                unit_price: 2.0,
                slot_max: 800,
            },
            RechargeableCatalogEntry {
                template_id: 2330000,
                unit_price: 0.5,
                slot_max: 1000,
            },
        ]);
        let shop = Shop::new(2001, true, vec![commodity(2070000, 500)]);

        let once = decorator.enrich(&test_tenant(), shop).await;
        let twice = decorator.enrich(&test_tenant(), once.clone()).await;

        assert_eq!(twice.commodities.len(), once.commodities.len());
        for (a, b) in once.commodities.iter().zip(&twice.commodities) {
            assert_eq!(a.template_id, b.template_id);
            assert_eq!(a.unit_price, b.unit_price);
            assert_eq!(a.slot_max, b.slot_max);
        }
    }

    #[tokio::test]
    async fn test_catalog_pricing_by_inventory_type() {
        let mut catalog = MockItemCatalog::new();
        catalog.expect_consumable().returning(|_, _| {
            Ok(ConsumableEntry {
                price: 10,
                unit_price: 0.75,
                slot_max: 100,
                rechargeable: false,
            })
        });
        catalog
            .expect_setup()
            .returning(|_, _| Ok(SetupEntry { price: 1, slot_max: 5 }));
        catalog.expect_etc().returning(|_, _| {
            Ok(EtcEntry {
                price: 3,
                unit_price: 4.0,
                slot_max: 200,
            })
        });
        catalog.expect_equipable().never();
        let enricher = CatalogPricingEnricher::new(Arc::new(catalog));
        let shop = Shop::new(
            2001,
            false,
            vec![
                commodity(1302000, 100).with_derived(9.0, 9),
                commodity(2000000, 100),
                commodity(3010000, 100),
                commodity(4000000, 100),
            ],
        );

        let priced = enricher.enrich(&test_tenant(), shop).await;
        let derived: Vec<(f64, u32)> = priced
            .commodities
            .iter()
            .map(|c| (c.unit_price, c.slot_max))
            .collect();
        assert_eq!(derived, vec![(1.0, 1), (0.75, 100), (1.0, 5), (4.0, 200)]);
    }

    #[tokio::test]
    async fn test_catalog_failure_falls_back_to_defaults() {
        let mut catalog = MockItemCatalog::new();
        catalog
            .expect_etc()
            .returning(|_, template_id| Err(ShopError::CatalogEntryNotFound { template_id }));
        let enricher = CatalogPricingEnricher::new(Arc::new(catalog));
        let shop = Shop::new(2001, false, vec![commodity(4000000, 100).with_derived(7.0, 70)]);

        let priced = enricher.enrich(&test_tenant(), shop).await;
        assert_eq!(priced.commodities[0].unit_price, DEFAULT_UNIT_PRICE);
        assert_eq!(priced.commodities[0].slot_max, DEFAULT_SLOT_MAX);
    }

    #[tokio::test]
    async fn test_pipeline_runs_steps_in_order() {
        let mut catalog = MockItemCatalog::new();
        catalog.expect_consumable().returning(|_, _| {
            Ok(ConsumableEntry {
                unit_price: 9.0,
                slot_max: 9,
                ..Default::default()
            })
        });
        let catalog = Arc::new(catalog);
        let cache = Arc::new(ConsumableCache::new(catalog.clone()));
        cache.set_consumables(
            &test_tenant(),
            vec![RechargeableCatalogEntry {
                template_id: 2070000,
                unit_price: 2.0,
                slot_max: 800,
            }],
        );
        let pipeline = EnrichmentPipeline::standard(catalog, cache);
        let shop = Shop::new(2001, true, vec![commodity(2070000, 500)]);

        let decorated = pipeline.enrich(&test_tenant(), shop).await;

        // 可充值目录的值覆盖目录定价
        assert_eq!(decorated.commodities[0].unit_price, 2.0);
        assert_eq!(decorated.commodities[0].slot_max, 800);
    }
}
