//! 商店管理操作集成测试

use npc_shared::error::NpcError;
use npc_shop_service::error::ShopError;
use npc_shop_service::processor::ShopDefinition;
use npc_shop_service::shop::CommodityAttributes;
use npc_shop_service::test_utils::{TestHarness, other_tenant};
use uuid::Uuid;

#[tokio::test]
async fn test_create_shop_then_read_back() {
    let harness = TestHarness::new();

    harness
        .processor
        .create_shop(
            &harness.tenant,
            2001,
            false,
            vec![
                CommodityAttributes::priced(4003001, 5000),
                CommodityAttributes::priced(4003002, 7000),
            ],
        )
        .await
        .unwrap();

    let shop = harness.processor.get_shop(&harness.tenant, 2001).await.unwrap();
    assert_eq!(shop.npc_id, 2001);
    assert!(!shop.recharger);
    let templates: Vec<u32> = shop.commodities.iter().map(|c| c.template_id).collect();
    assert_eq!(templates, vec![4003001, 4003002]);
}

#[tokio::test]
async fn test_create_existing_shop_fails() {
    let harness = TestHarness::new();
    harness.seed_shop(2001, false, vec![]).await;

    let result = harness
        .processor
        .create_shop(&harness.tenant, 2001, true, vec![])
        .await;

    assert!(matches!(
        result,
        Err(ShopError::Shared(NpcError::AlreadyExists { .. }))
    ));
}

#[tokio::test]
async fn test_update_shop_replaces_commodities() {
    let harness = TestHarness::new();
    harness
        .seed_shop(2001, false, vec![CommodityAttributes::priced(4003001, 5000)])
        .await;

    harness
        .processor
        .update_shop(
            &harness.tenant,
            2001,
            true,
            vec![CommodityAttributes::priced(4003002, 10)],
        )
        .await
        .unwrap();

    let shop = harness.processor.get_shop(&harness.tenant, 2001).await.unwrap();
    assert!(shop.recharger);
    assert_eq!(shop.commodities.len(), 1);
    assert_eq!(shop.commodities[0].template_id, 4003002);
}

#[tokio::test]
async fn test_commodity_lifecycle() {
    let harness = TestHarness::new();
    harness.seed_shop(2001, false, vec![]).await;

    let added = harness
        .processor
        .add_commodity(&harness.tenant, 2001, CommodityAttributes::priced(4003001, 100))
        .await
        .unwrap();
    let updated = harness
        .processor
        .update_commodity(&harness.tenant, added.id, CommodityAttributes::priced(4003001, 250))
        .await
        .unwrap();
    assert_eq!(updated.id, added.id);
    assert_eq!(updated.meso_price, 250);

    harness
        .processor
        .remove_commodity(&harness.tenant, added.id)
        .await
        .unwrap();
    let shop = harness.processor.get_shop(&harness.tenant, 2001).await.unwrap();
    assert!(shop.commodities.is_empty());

    let missing = harness
        .processor
        .remove_commodity(&harness.tenant, Uuid::new_v4())
        .await;
    assert!(matches!(missing, Err(ShopError::CommodityNotFound { .. })));
}

#[tokio::test]
async fn test_batch_create_and_delete_all() {
    let harness = TestHarness::new();
    let definitions: Vec<ShopDefinition> = serde_json::from_value(serde_json::json!([
        {"npcId": 2001, "commodities": [{"templateId": 4003001, "mesoPrice": 5000}]},
        {"npcId": 2002, "recharger": true}
    ]))
    .unwrap();

    let created = harness
        .processor
        .create_shops(&harness.tenant, definitions)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(harness.processor.get_all_shops(&harness.tenant).await.unwrap().len(), 2);

    harness
        .processor
        .delete_all_commodities_by_npc(&harness.tenant, 2001)
        .await
        .unwrap();
    let shop = harness.processor.get_shop(&harness.tenant, 2001).await.unwrap();
    assert!(shop.commodities.is_empty());

    harness.processor.delete_all_shops(&harness.tenant).await.unwrap();
    assert!(harness.processor.get_all_shops(&harness.tenant).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shops_are_tenant_scoped() {
    let harness = TestHarness::new();
    harness.seed_shop(2001, false, vec![]).await;

    let result = harness.processor.get_shop(&other_tenant(), 2001).await;

    assert!(matches!(result, Err(ShopError::ShopNotFound { npc_id: 2001 })));
    assert!(harness.processor.get_all_shops(&other_tenant()).await.unwrap().is_empty());
}
