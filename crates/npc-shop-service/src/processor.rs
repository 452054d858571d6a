//! 商店交易处理器
//!
//! 实现进店、离店、购买、出售、充值五种操作。角色必须先进店，
//! 购买/出售/充值之后仍留在店内，直到离店。
//!
//! 校验失败统一转换为一条错误状态事件写入 `MessageBuffer`，且不发起任何远程变更；
//! 远程变更请求（金币、背包）一旦发出即视为交易完成，不做补偿。

use std::sync::Arc;

use npc_shared::kafka::MessageProducer;
use npc_shared::observability::metrics::record_shop_transaction;
use npc_shared::tenant::Tenant;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::ItemCatalog;
use crate::character::{ACTOR_TYPE_SHOP, CharacterService};
use crate::compartment::CompartmentService;
use crate::decorator::EnrichmentPipeline;
use crate::error::{Result, ShopError};
use crate::inventory::{Character, InventoryType};
use crate::message::{ErrorCode, MessageBuffer, StatusEvent};
use crate::registry::ShopRegistry;
use crate::repository::CommodityRepository;
use crate::shop::{Commodity, CommodityAttributes, Shop};
use crate::skill::{SkillService, recharge_bonus};

/// 代币购买尚未支持时返回的原因
pub const REASON_NOT_IMPLEMENTED: &str = "not implemented";

/// 交易依赖的远程服务
#[derive(Clone)]
pub struct Collaborators {
    pub characters: Arc<dyn CharacterService>,
    pub compartments: Arc<dyn CompartmentService>,
    pub catalog: Arc<dyn ItemCatalog>,
    pub skills: Arc<dyn SkillService>,
    pub producer: Arc<dyn MessageProducer>,
}

/// 批量创建商店时的单个商店定义
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopDefinition {
    pub npc_id: u32,
    #[serde(default)]
    pub recharger: bool,
    #[serde(default)]
    pub commodities: Vec<CommodityAttributes>,
}

/// 在发起任何远程变更前被拒绝的交易
#[derive(Debug)]
struct Rejection {
    code: ErrorCode,
    reason: Option<String>,
}

impl Rejection {
    fn new(code: ErrorCode) -> Self {
        Self { code, reason: None }
    }

    fn generic() -> Self {
        Self::new(ErrorCode::GenericError)
    }

    fn into_event(self, character_id: u32) -> StatusEvent {
        match self.reason {
            Some(reason) => StatusEvent::error_with_reason(character_id, reason),
            None => StatusEvent::error(character_id, self.code),
        }
    }
}

type Outcome = std::result::Result<(), Rejection>;

pub struct ShopProcessor {
    registry: Arc<ShopRegistry>,
    commodities: Arc<dyn CommodityRepository>,
    enrichment: EnrichmentPipeline,
    collaborators: Collaborators,
}

impl ShopProcessor {
    pub fn new(
        registry: Arc<ShopRegistry>,
        commodities: Arc<dyn CommodityRepository>,
        enrichment: EnrichmentPipeline,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            registry,
            commodities,
            enrichment,
            collaborators,
        }
    }

    // ==================== 查询与管理 ====================

    /// 读取经过装饰的商店
    pub async fn get_shop(&self, tenant: &Tenant, npc_id: u32) -> Result<Shop> {
        let shop = self
            .commodities
            .get_shop(tenant, npc_id)
            .await?
            .ok_or(ShopError::ShopNotFound { npc_id })?;
        Ok(self.enrichment.enrich(tenant, shop).await)
    }

    pub async fn get_all_shops(&self, tenant: &Tenant) -> Result<Vec<Shop>> {
        let mut shops = Vec::new();
        for shop in self.commodities.list_shops(tenant).await? {
            shops.push(self.enrichment.enrich(tenant, shop).await);
        }
        Ok(shops)
    }

    pub async fn create_shop(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Result<Shop> {
        let shop = self
            .commodities
            .create_shop(tenant, npc_id, recharger, commodities)
            .await?;
        info!(npc_id, recharger, commodities = shop.commodities.len(), "已创建商店");
        Ok(shop)
    }

    /// 替换商店的充值标记和全部商品
    pub async fn update_shop(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Result<Shop> {
        let shop = self
            .commodities
            .replace_shop(tenant, npc_id, recharger, commodities)
            .await?;
        info!(npc_id, recharger, commodities = shop.commodities.len(), "已更新商店");
        Ok(shop)
    }

    pub async fn create_shops(
        &self,
        tenant: &Tenant,
        definitions: Vec<ShopDefinition>,
    ) -> Result<Vec<Shop>> {
        let mut created = Vec::with_capacity(definitions.len());
        for definition in definitions {
            created.push(
                self.create_shop(
                    tenant,
                    definition.npc_id,
                    definition.recharger,
                    definition.commodities,
                )
                .await?,
            );
        }
        Ok(created)
    }

    pub async fn add_commodity(
        &self,
        tenant: &Tenant,
        npc_id: u32,
        attributes: CommodityAttributes,
    ) -> Result<Commodity> {
        self.commodities
            .create_commodity(tenant, npc_id, attributes)
            .await
    }

    pub async fn update_commodity(
        &self,
        tenant: &Tenant,
        commodity_id: Uuid,
        attributes: CommodityAttributes,
    ) -> Result<Commodity> {
        self.commodities
            .update_commodity(tenant, commodity_id, attributes)
            .await
    }

    pub async fn remove_commodity(&self, tenant: &Tenant, commodity_id: Uuid) -> Result<()> {
        self.commodities.delete_commodity(tenant, commodity_id).await
    }

    pub async fn delete_all_commodities_by_npc(&self, tenant: &Tenant, npc_id: u32) -> Result<()> {
        self.commodities.delete_all_by_npc(tenant, npc_id).await
    }

    pub async fn delete_all_shops(&self, tenant: &Tenant) -> Result<()> {
        warn!(tenant = %tenant, "删除租户的全部商店");
        self.commodities.delete_all(tenant).await
    }

    pub fn get_characters_in_shop(&self, tenant: &Tenant, npc_id: u32) -> Vec<u32> {
        self.registry.get_characters_in_shop(tenant, npc_id)
    }

    // ==================== 进店 / 离店 ====================

    /// 进入商店；商店不存在是返回给调用方的硬错误，不产生事件
    pub async fn enter(
        &self,
        buffer: &mut MessageBuffer,
        tenant: &Tenant,
        character_id: u32,
        npc_id: u32,
    ) -> Result<()> {
        match self.commodities.get_shop(tenant, npc_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(character_id, npc_id, "角色尝试进入不存在的商店");
                record_shop_transaction("enter", "shop_not_found");
                return Err(ShopError::ShopNotFound { npc_id });
            }
            Err(e) => {
                error!(character_id, npc_id, error = %e, "获取商店失败");
                record_shop_transaction("enter", "error");
                return Err(e);
            }
        }

        self.registry.add_character(tenant, character_id, npc_id);
        buffer.put(StatusEvent::entered(character_id, npc_id));
        record_shop_transaction("enter", "ok");
        debug!(character_id, npc_id, "角色已进入商店");
        Ok(())
    }

    /// 离开商店；只有确实在店内时才产生离店事件
    pub async fn exit(
        &self,
        buffer: &mut MessageBuffer,
        tenant: &Tenant,
        character_id: u32,
    ) -> Result<()> {
        if !self.registry.remove_character(tenant, character_id) {
            record_shop_transaction("exit", "not_in_shop");
            return Ok(());
        }
        buffer.put(StatusEvent::exited(character_id));
        record_shop_transaction("exit", "ok");
        debug!(character_id, "角色已离开商店");
        Ok(())
    }

    // ==================== 购买 ====================

    #[allow(clippy::too_many_arguments)]
    pub async fn buy(
        &self,
        buffer: &mut MessageBuffer,
        tenant: &Tenant,
        character_id: u32,
        slot: u16,
        item_template_id: u32,
        quantity: u32,
        discount_price: u32,
    ) -> Result<()> {
        debug!(character_id, item_template_id, slot, quantity, discount_price, "角色尝试购买物品");
        let outcome = self
            .try_buy(tenant, character_id, item_template_id, quantity)
            .await;
        self.settle("buy", buffer, character_id, outcome);
        Ok(())
    }

    async fn try_buy(
        &self,
        tenant: &Tenant,
        character_id: u32,
        item_template_id: u32,
        quantity: u32,
    ) -> Outcome {
        let shop_id = self.require_in_shop(tenant, character_id)?;

        let shop = self.get_shop(tenant, shop_id).await.map_err(|e| {
            error!(character_id, shop_id, error = %e, "获取商店商品失败");
            Rejection::generic()
        })?;

        let commodity = shop.find_by_template(item_template_id).cloned().ok_or_else(|| {
            warn!(character_id, shop_id, item_template_id, "商店中没有该商品");
            Rejection::generic()
        })?;

        let character = self.fetch_character(tenant, character_id).await?;

        if commodity.meso_price == 0 {
            warn!(character_id, item_template_id, "代币购买尚未支持");
            return Err(Rejection {
                code: ErrorCode::GenericErrorWithReason,
                reason: Some(REASON_NOT_IMPLEMENTED.to_string()),
            });
        }

        let total_cost = u64::from(commodity.meso_price) * u64::from(quantity);
        if u64::from(character.meso) < total_cost {
            warn!(character_id, meso = character.meso, total_cost, "金币不足");
            return Err(Rejection::new(ErrorCode::NotEnoughMoney));
        }

        let inventory_type = InventoryType::from_template_id(item_template_id).ok_or_else(|| {
            error!(character_id, item_template_id, "物品模板无效");
            Rejection::generic()
        })?;

        let has_free_slot = character
            .compartment(inventory_type)
            .and_then(|c| c.next_free_slot())
            .is_some();
        if !has_free_slot {
            warn!(character_id, %inventory_type, "背包已满");
            return Err(Rejection::new(ErrorCode::InventoryFull));
        }

        let amount = i32::try_from(total_cost).map_err(|_| {
            error!(character_id, total_cost, "金币变更超出范围");
            Rejection::generic()
        })?;

        // 以下为远程变更，发出即视为完成
        if let Err(e) = self
            .collaborators
            .characters
            .request_change_meso(
                tenant,
                character.world_id,
                character_id,
                character_id,
                ACTOR_TYPE_SHOP,
                -amount,
            )
            .await
        {
            error!(character_id, error = %e, "请求扣除金币失败");
        }
        if let Err(e) = self
            .collaborators
            .compartments
            .request_create_item(tenant, character_id, item_template_id, quantity)
            .await
        {
            error!(character_id, item_template_id, error = %e, "请求创建物品失败");
        }

        info!(character_id, item_template_id, quantity, total_cost, "角色已购买物品");
        Ok(())
    }

    // ==================== 出售 ====================

    pub async fn sell(
        &self,
        buffer: &mut MessageBuffer,
        tenant: &Tenant,
        character_id: u32,
        slot: i16,
        item_template_id: u32,
        quantity: u32,
    ) -> Result<()> {
        debug!(character_id, item_template_id, slot, quantity, "角色尝试出售物品");
        let outcome = self
            .try_sell(tenant, character_id, slot, item_template_id, quantity)
            .await;
        self.settle("sell", buffer, character_id, outcome);
        Ok(())
    }

    async fn try_sell(
        &self,
        tenant: &Tenant,
        character_id: u32,
        slot: i16,
        item_template_id: u32,
        quantity: u32,
    ) -> Outcome {
        self.require_in_shop(tenant, character_id)?;

        if quantity == 0 {
            warn!(character_id, slot, item_template_id, "出售数量为零");
            return Err(Rejection::generic());
        }

        let character = self.fetch_character(tenant, character_id).await?;

        let inventory_type = InventoryType::from_template_id(item_template_id).ok_or_else(|| {
            error!(character_id, item_template_id, "物品模板无效");
            Rejection::generic()
        })?;

        let asset = character
            .compartment(inventory_type)
            .and_then(|c| c.find_by_slot(slot))
            .ok_or_else(|| {
                warn!(character_id, %inventory_type, slot, "格子中没有物品");
                Rejection::generic()
            })?;

        if asset.template_id != item_template_id {
            warn!(
                character_id,
                slot,
                expected = item_template_id,
                actual = asset.template_id,
                "格子中的物品与出售请求不符"
            );
            return Err(Rejection::generic());
        }

        if asset.quantity < quantity {
            warn!(character_id, slot, on_hand = asset.quantity, quantity, "物品数量不足");
            return Err(Rejection::new(ErrorCode::NeedMoreItems));
        }

        let unit_price = self
            .sell_price(tenant, inventory_type, item_template_id)
            .await
            .map_err(|e| {
                error!(character_id, item_template_id, error = %e, "查询物品售价失败");
                Rejection::generic()
            })?;

        let price = u64::from(unit_price) * u64::from(quantity);
        let amount = i32::try_from(price).map_err(|_| {
            error!(character_id, price, "金币变更超出范围");
            Rejection::generic()
        })?;

        if let Err(e) = self
            .collaborators
            .characters
            .request_change_meso(
                tenant,
                character.world_id,
                character_id,
                character_id,
                ACTOR_TYPE_SHOP,
                amount,
            )
            .await
        {
            error!(character_id, error = %e, "请求增加金币失败");
        }
        if let Err(e) = self
            .collaborators
            .compartments
            .request_destroy_item(tenant, character_id, inventory_type, slot, quantity)
            .await
        {
            error!(character_id, slot, error = %e, "请求销毁物品失败");
        }

        info!(character_id, item_template_id, quantity, price, "角色已出售物品");
        Ok(())
    }

    /// 按物品分类查询单件售价；现金物品不可出售
    async fn sell_price(
        &self,
        tenant: &Tenant,
        inventory_type: InventoryType,
        template_id: u32,
    ) -> Result<u32> {
        let catalog = &self.collaborators.catalog;
        match inventory_type {
            InventoryType::Equip => Ok(catalog.equipable(tenant, template_id).await?.price),
            InventoryType::Use => Ok(catalog.consumable(tenant, template_id).await?.price),
            InventoryType::Setup => Ok(catalog.setup(tenant, template_id).await?.price),
            InventoryType::Etc => Ok(catalog.etc(tenant, template_id).await?.price),
            InventoryType::Cash => Err(ShopError::CatalogEntryNotFound { template_id }),
        }
    }

    // ==================== 充值 ====================

    pub async fn recharge(
        &self,
        buffer: &mut MessageBuffer,
        tenant: &Tenant,
        character_id: u32,
        slot: u16,
    ) -> Result<()> {
        debug!(character_id, slot, "角色尝试充值物品");
        let outcome = self.try_recharge(tenant, character_id, slot).await;
        self.settle("recharge", buffer, character_id, outcome);
        Ok(())
    }

    async fn try_recharge(&self, tenant: &Tenant, character_id: u32, slot: u16) -> Outcome {
        let shop_id = self.require_in_shop(tenant, character_id)?;

        let recharger = match self.commodities.get_shop(tenant, shop_id).await {
            Ok(Some(shop)) => shop.recharger,
            Ok(None) => false,
            Err(e) => {
                error!(character_id, shop_id, error = %e, "获取商店失败");
                return Err(Rejection::generic());
            }
        };
        if !recharger {
            warn!(character_id, shop_id, "商店不提供充值");
            return Err(Rejection::generic());
        }

        let character = self.fetch_character(tenant, character_id).await?;

        let slot = i16::try_from(slot).map_err(|_| Rejection::generic())?;
        let asset = character
            .compartment(InventoryType::Use)
            .and_then(|c| c.find_by_slot(slot))
            .ok_or_else(|| {
                warn!(character_id, slot, "格子中没有可充值的消耗品");
                Rejection::generic()
            })?;

        let consumable = self
            .collaborators
            .catalog
            .consumable(tenant, asset.template_id)
            .await
            .map_err(|e| {
                error!(character_id, template_id = asset.template_id, error = %e, "查询消耗品目录失败");
                Rejection::generic()
            })?;

        let bonus = recharge_bonus(
            self.collaborators.skills.as_ref(),
            tenant,
            character_id,
            asset.template_id,
        )
        .await
        .map_err(|e| {
            error!(character_id, error = %e, "查询技能等级失败");
            Rejection::generic()
        })?;

        let capacity = consumable.slot_max.saturating_add(bonus);
        if asset.quantity >= capacity {
            warn!(character_id, slot, quantity = asset.quantity, capacity, "物品已满，无需充值");
            return Ok(());
        }

        let deficit = capacity - asset.quantity;
        let price = recharge_price(consumable.unit_price, deficit);
        if u64::from(character.meso) < price {
            warn!(character_id, meso = character.meso, price, "金币不足以充值");
            return Err(Rejection::new(ErrorCode::NotEnoughMoney2));
        }

        let amount = i32::try_from(price).map_err(|_| Rejection::generic())?;

        if let Err(e) = self
            .collaborators
            .characters
            .request_change_meso(
                tenant,
                character.world_id,
                character_id,
                character_id,
                ACTOR_TYPE_SHOP,
                -amount,
            )
            .await
        {
            error!(character_id, error = %e, "请求扣除充值金币失败");
            return Err(Rejection::generic());
        }
        if let Err(e) = self
            .collaborators
            .compartments
            .request_recharge_item(tenant, character_id, InventoryType::Use, slot, deficit)
            .await
        {
            error!(character_id, slot, error = %e, "请求充值物品失败");
            return Err(Rejection::generic());
        }

        info!(character_id, slot, deficit, price, "角色已充值物品");
        Ok(())
    }

    // ==================== 带发送的入口 ====================

    pub async fn enter_and_emit(&self, tenant: &Tenant, character_id: u32, npc_id: u32) -> Result<()> {
        let mut buffer = MessageBuffer::new();
        self.enter(&mut buffer, tenant, character_id, npc_id).await?;
        self.emit(buffer, tenant).await
    }

    pub async fn exit_and_emit(&self, tenant: &Tenant, character_id: u32) -> Result<()> {
        let mut buffer = MessageBuffer::new();
        self.exit(&mut buffer, tenant, character_id).await?;
        self.emit(buffer, tenant).await
    }

    pub async fn buy_and_emit(
        &self,
        tenant: &Tenant,
        character_id: u32,
        slot: u16,
        item_template_id: u32,
        quantity: u32,
        discount_price: u32,
    ) -> Result<()> {
        let mut buffer = MessageBuffer::new();
        self.buy(
            &mut buffer,
            tenant,
            character_id,
            slot,
            item_template_id,
            quantity,
            discount_price,
        )
        .await?;
        self.emit(buffer, tenant).await
    }

    pub async fn sell_and_emit(
        &self,
        tenant: &Tenant,
        character_id: u32,
        slot: i16,
        item_template_id: u32,
        quantity: u32,
    ) -> Result<()> {
        let mut buffer = MessageBuffer::new();
        self.sell(&mut buffer, tenant, character_id, slot, item_template_id, quantity)
            .await?;
        self.emit(buffer, tenant).await
    }

    pub async fn recharge_and_emit(&self, tenant: &Tenant, character_id: u32, slot: u16) -> Result<()> {
        let mut buffer = MessageBuffer::new();
        self.recharge(&mut buffer, tenant, character_id, slot).await?;
        self.emit(buffer, tenant).await
    }

    // ==================== 内部辅助 ====================

    async fn emit(&self, buffer: MessageBuffer, tenant: &Tenant) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        buffer
            .flush(self.collaborators.producer.as_ref(), tenant)
            .await?;
        Ok(())
    }

    fn require_in_shop(&self, tenant: &Tenant, character_id: u32) -> std::result::Result<u32, Rejection> {
        self.registry.get_shop(tenant, character_id).ok_or_else(|| {
            warn!(character_id, "角色不在任何商店中");
            Rejection::generic()
        })
    }

    async fn fetch_character(
        &self,
        tenant: &Tenant,
        character_id: u32,
    ) -> std::result::Result<Character, Rejection> {
        self.collaborators
            .characters
            .get_by_id(tenant, character_id)
            .await
            .map_err(|e| {
                error!(character_id, error = %e, "获取角色失败");
                Rejection::generic()
            })
    }

    /// 被拒绝的交易写入一条错误事件
    fn settle(
        &self,
        operation: &'static str,
        buffer: &mut MessageBuffer,
        character_id: u32,
        outcome: Outcome,
    ) {
        match outcome {
            Ok(()) => record_shop_transaction(operation, "ok"),
            Err(rejection) => {
                record_shop_transaction(operation, rejection.code.as_str());
                buffer.put(rejection.into_event(character_id));
            }
        }
    }
}

/// 充值价格：`ceil(unit_price × deficit)`
pub fn recharge_price(unit_price: f64, deficit: u32) -> u64 {
    (unit_price * f64::from(deficit)).ceil() as u64
}
