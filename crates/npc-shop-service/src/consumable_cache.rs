//! 可充值消耗品缓存
//!
//! 按租户 ID 懒加载物品目录中的可充值消耗品，避免每次读取商店都请求目录服务。
//! 目录在进程生命周期内视为静态，没有 TTL；需要刷新时调用 `set_consumables`。

use std::collections::HashMap;
use std::sync::Arc;

use npc_shared::observability::metrics::record_consumable_cache_load;
use npc_shared::tenant::Tenant;
use parking_lot::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::catalog::{ItemCatalog, RechargeableCatalogEntry};

pub struct ConsumableCache {
    catalog: Arc<dyn ItemCatalog>,
    entries: RwLock<HashMap<Uuid, Vec<RechargeableCatalogEntry>>>,
}

impl ConsumableCache {
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        Self {
            catalog,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 获取租户的可充值消耗品（副本）
    ///
    /// 未命中时同步拉取并写入缓存；拉取失败返回空列表且不写入，下次读取会重试。
    pub async fn get_consumables(&self, tenant: &Tenant) -> Vec<RechargeableCatalogEntry> {
        let cached = self.entries.read().get(&tenant.id).cloned();
        if let Some(cached) = cached {
            return cached;
        }

        info!(tenant = %tenant, "加载租户的可充值消耗品");
        let loaded = match self.catalog.rechargeable_consumables(tenant).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(tenant = %tenant, error = %e, "加载可充值消耗品失败");
                record_consumable_cache_load(false);
                return Vec::new();
            }
        };
        record_consumable_cache_load(true);

        self.entries.write().insert(tenant.id, loaded.clone());
        loaded
    }

    /// 覆盖租户的缓存内容
    pub fn set_consumables(&self, tenant: &Tenant, entries: Vec<RechargeableCatalogEntry>) {
        self.entries.write().insert(tenant.id, entries);
    }
}
