//! 在店登记表
//!
//! 记录"哪个角色正在浏览哪个商店"，按租户 ID 隔离，区域与版本不参与分区。正向索引为角色 -> 商店，
//! 反向索引为商店 -> 角色列表，两者由同一把读写锁保护并始终保持一致。
//! 数据只存在于内存，进程重启后丢失，角色重新进入商店即可恢复。

use std::collections::HashMap;

use npc_shared::tenant::Tenant;
use parking_lot::RwLock;
use uuid::Uuid;

/// 表示"不在任何商店"的商店 ID
pub const NO_SHOP: u32 = 0;

#[derive(Default)]
struct RegistryState {
    character_shop: HashMap<Uuid, HashMap<u32, u32>>,
    shop_characters: HashMap<Uuid, HashMap<u32, Vec<u32>>>,
}

impl RegistryState {
    fn ensure_tenant_maps(&mut self, tenant_id: Uuid) {
        self.character_shop.entry(tenant_id).or_default();
        self.shop_characters.entry(tenant_id).or_default();
    }

    /// 从商店的反向索引中移除角色，桶为空时一并删除
    fn remove_from_bucket(&mut self, tenant_id: Uuid, shop_id: u32, character_id: u32) {
        let Some(buckets) = self.shop_characters.get_mut(&tenant_id) else {
            return;
        };
        let Some(characters) = buckets.get_mut(&shop_id) else {
            return;
        };
        if let Some(index) = characters.iter().position(|c| *c == character_id) {
            characters.swap_remove(index);
        }
        if characters.is_empty() {
            buckets.remove(&shop_id);
        }
    }
}

/// 角色与商店的双向登记表
#[derive(Default)]
pub struct ShopRegistry {
    state: RwLock<RegistryState>,
}

impl ShopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将角色登记到商店，覆盖之前的登记
    ///
    /// `shop_id` 为 [`NO_SHOP`] 时只清除旧的反向索引。
    pub fn add_character(&self, tenant: &Tenant, character_id: u32, shop_id: u32) {
        let tenant_id = tenant.id;
        let mut state = self.state.write();
        state.ensure_tenant_maps(tenant_id);

        let previous = state
            .character_shop
            .get(&tenant_id)
            .and_then(|m| m.get(&character_id).copied())
            .unwrap_or(NO_SHOP);
        if previous != NO_SHOP {
            state.remove_from_bucket(tenant_id, previous, character_id);
        }

        if let Some(forward) = state.character_shop.get_mut(&tenant_id) {
            forward.insert(character_id, shop_id);
        }

        if shop_id != NO_SHOP
            && let Some(buckets) = state.shop_characters.get_mut(&tenant_id)
        {
            let characters = buckets.entry(shop_id).or_default();
            if !characters.contains(&character_id) {
                characters.push(character_id);
            }
        }
    }

    /// 移除角色的登记，返回角色此前是否在某个商店中
    pub fn remove_character(&self, tenant: &Tenant, character_id: u32) -> bool {
        let mut state = self.state.write();

        let previous = state
            .character_shop
            .get_mut(&tenant.id)
            .and_then(|m| m.remove(&character_id))
            .unwrap_or(NO_SHOP);
        if previous == NO_SHOP {
            return false;
        }

        state.remove_from_bucket(tenant.id, previous, character_id);
        true
    }

    /// 角色当前所在的商店
    pub fn get_shop(&self, tenant: &Tenant, character_id: u32) -> Option<u32> {
        let state = self.state.read();
        state
            .character_shop
            .get(&tenant.id)
            .and_then(|m| m.get(&character_id).copied())
            .filter(|shop_id| *shop_id != NO_SHOP)
    }

    /// 商店中的角色列表（副本）
    pub fn get_characters_in_shop(&self, tenant: &Tenant, shop_id: u32) -> Vec<u32> {
        let state = self.state.read();
        state
            .shop_characters
            .get(&tenant.id)
            .and_then(|m| m.get(&shop_id))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{other_tenant, test_tenant};
    use std::sync::Arc;

    #[test]
    fn test_add_character() {
        let registry = ShopRegistry::new();
        let tenant = test_tenant();

        registry.add_character(&tenant, 1000, 2001);

        assert_eq!(registry.get_shop(&tenant, 1000), Some(2001));
        assert_eq!(registry.get_characters_in_shop(&tenant, 2001), vec![1000]);
    }

    #[test]
    fn test_re_enter_moves_character_between_shops() {
        let registry = ShopRegistry::new();
        let tenant = test_tenant();

        registry.add_character(&tenant, 1000, 2001);
        registry.add_character(&tenant, 1001, 2001);
        registry.add_character(&tenant, 1000, 2002);

        assert_eq!(registry.get_shop(&tenant, 1000), Some(2002));
        assert_eq!(registry.get_characters_in_shop(&tenant, 2001), vec![1001]);
        assert_eq!(registry.get_characters_in_shop(&tenant, 2002), vec![1000]);
    }

    #[test]
    fn test_add_same_shop_twice_does_not_duplicate() {
        let registry = ShopRegistry::new();
        let tenant = test_tenant();

        registry.add_character(&tenant, 1000, 2001);
        registry.add_character(&tenant, 1000, 2001);

        assert_eq!(registry.get_characters_in_shop(&tenant, 2001), vec![1000]);
    }

    #[test]
    fn test_remove_character_is_idempotent() {
        let registry = ShopRegistry::new();
        let tenant = test_tenant();
        registry.add_character(&tenant, 1000, 2001);

        assert!(registry.remove_character(&tenant, 1000));
        assert_eq!(registry.get_shop(&tenant, 1000), None);
        assert!(registry.get_characters_in_shop(&tenant, 2001).is_empty());

        assert!(!registry.remove_character(&tenant, 1000));
    }

    #[test]
    fn test_remove_unknown_character() {
        let registry = ShopRegistry::new();
        assert!(!registry.remove_character(&test_tenant(), 42));
    }

    #[test]
    fn test_no_shop_sentinel_is_not_present() {
        let registry = ShopRegistry::new();
        let tenant = test_tenant();
        registry.add_character(&tenant, 1000, 2001);
        registry.add_character(&tenant, 1000, NO_SHOP);

        assert_eq!(registry.get_shop(&tenant, 1000), None);
        assert!(registry.get_characters_in_shop(&tenant, 2001).is_empty());
        assert!(!registry.remove_character(&tenant, 1000));
    }

    #[test]
    fn test_tenants_are_isolated() {
        let registry = ShopRegistry::new();
        registry.add_character(&test_tenant(), 1000, 2001);

        assert_eq!(registry.get_shop(&other_tenant(), 1000), None);
        assert!(registry.get_characters_in_shop(&other_tenant(), 2001).is_empty());
        assert!(!registry.remove_character(&other_tenant(), 1000));
        assert_eq!(registry.get_shop(&test_tenant(), 1000), Some(2001));
    }

    #[test]
    fn test_same_tenant_id_shares_registrations() {
        let registry = ShopRegistry::new();
        let upgraded = Tenant::new(test_tenant().id, "EMS", 90, 2);
        registry.add_character(&test_tenant(), 1000, 2001);

        assert_eq!(registry.get_shop(&upgraded, 1000), Some(2001));
        assert_eq!(registry.get_characters_in_shop(&upgraded, 2001), vec![1000]);
        assert!(registry.remove_character(&upgraded, 1000));
        assert_eq!(registry.get_shop(&test_tenant(), 1000), None);
    }

    #[test]
    fn test_returned_list_is_a_copy() {
        let registry = ShopRegistry::new();
        let tenant = test_tenant();
        registry.add_character(&tenant, 1000, 2001);

        let mut characters = registry.get_characters_in_shop(&tenant, 2001);
        characters.push(9999);

        assert_eq!(registry.get_characters_in_shop(&tenant, 2001), vec![1000]);
    }

    #[test]
    fn test_concurrent_moves_keep_indices_consistent() {
        let registry = Arc::new(ShopRegistry::new());
        let tenant = test_tenant();

        let handles: Vec<_> = (0..8u32)
            .map(|worker| {
                let registry = registry.clone();
                let tenant = tenant.clone();
                std::thread::spawn(move || {
                    for round in 0..200u32 {
                        let character_id = worker;
                        registry.add_character(&tenant, character_id, 2001 + (round % 3));
                        if round % 7 == 0 {
                            registry.remove_character(&tenant, character_id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for character_id in 0..8u32 {
            let in_buckets: Vec<u32> = (2001..2004)
                .filter(|shop| {
                    registry
                        .get_characters_in_shop(&tenant, *shop)
                        .contains(&character_id)
                })
                .collect();
            match registry.get_shop(&tenant, character_id) {
                Some(shop) => assert_eq!(in_buckets, vec![shop]),
                None => assert!(in_buckets.is_empty()),
            }
        }
    }
}
