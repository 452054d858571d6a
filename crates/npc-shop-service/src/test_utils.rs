//! 测试工具模块
//!
//! 提供记录型消息生产者、各远程服务的内存替身以及组装好的 `TestHarness`，
//! 供单元测试和 `tests/` 下的集成测试共用。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use npc_shared::error::NpcError;
use npc_shared::kafka::{MessageProducer, topics};
use npc_shared::tenant::Tenant;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::{
    ConsumableEntry, EquipableEntry, EtcEntry, ItemCatalog, RechargeableCatalogEntry, SetupEntry,
};
use crate::character::CharacterService;
use crate::compartment::CompartmentService;
use crate::consumable_cache::ConsumableCache;
use crate::decorator::EnrichmentPipeline;
use crate::error::{Result, ShopError};
use crate::inventory::{Asset, Character, Compartment, Inventory, InventoryType};
use crate::message::StatusEvent;
use crate::processor::{Collaborators, ShopProcessor};
use crate::registry::ShopRegistry;
use crate::repository::{CommodityRepository, MemoryCommodityRepository};
use crate::shop::{CommodityAttributes, Shop};
use crate::skill::SkillService;

// ==================== 租户 ====================

pub fn test_tenant() -> Tenant {
    Tenant::new(
        Uuid::from_u128(0x083839c6_c47c_42a6_9585_76492795d123),
        "GMS",
        83,
        1,
    )
}

pub fn other_tenant() -> Tenant {
    Tenant::new(
        Uuid::from_u128(0x1a2b3c4d_0000_4000_8000_000000000002),
        "JMS",
        185,
        1,
    )
}

// ==================== 角色数据 ====================

/// 每个背包分类的默认容量
pub const TEST_COMPARTMENT_CAPACITY: u32 = 24;

/// 五个空背包、零号世界的角色
pub fn test_character(id: u32, meso: u32) -> Character {
    let compartments = [
        InventoryType::Equip,
        InventoryType::Use,
        InventoryType::Setup,
        InventoryType::Etc,
        InventoryType::Cash,
    ]
    .into_iter()
    .map(|inventory_type| Compartment {
        inventory_type,
        capacity: TEST_COMPARTMENT_CAPACITY,
        assets: Vec::new(),
    })
    .collect();

    Character {
        id,
        world_id: 0,
        meso,
        inventory: Inventory { compartments },
    }
}

/// 在指定背包格子中放入物品
pub fn with_asset(
    mut character: Character,
    inventory_type: InventoryType,
    slot: i16,
    template_id: u32,
    quantity: u32,
) -> Character {
    if let Some(compartment) = character
        .inventory
        .compartments
        .iter_mut()
        .find(|c| c.inventory_type == inventory_type)
    {
        compartment.assets.retain(|a| a.slot != slot);
        compartment.assets.push(Asset {
            slot,
            template_id,
            quantity,
        });
    }
    character
}

// ==================== 消息生产者 ====================

/// 一条已发送的消息
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl SentMessage {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.payload).unwrap_or(Value::Null)
    }
}

/// 记录全部发送内容的生产者
#[derive(Default)]
pub struct RecordingProducer {
    sent: Mutex<Vec<SentMessage>>,
    fail: AtomicBool,
}

impl RecordingProducer {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, topic: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// 已发送的商店状态事件
    pub fn status_events(&self) -> Vec<StatusEvent> {
        self.sent_to(topics::NPC_SHOP_STATUS_EVENTS)
            .iter()
            .filter_map(|m| serde_json::from_slice(&m.payload).ok())
            .collect()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageProducer for RecordingProducer {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> std::result::Result<(), NpcError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NpcError::Kafka("broker 不可用".to_string()));
        }
        self.sent.lock().push(SentMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
            headers: headers.clone(),
        });
        Ok(())
    }
}

// ==================== 远程服务替身 ====================

/// 发往角色服务和背包服务的变更请求
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    ChangeMeso {
        character_id: u32,
        world_id: u8,
        actor_id: u32,
        actor_type: String,
        amount: i32,
    },
    CreateItem {
        character_id: u32,
        template_id: u32,
        quantity: u32,
    },
    DestroyItem {
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    },
    RechargeItem {
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    },
}

/// 角色服务和背包服务共享的请求日志，保留跨服务的发出顺序
pub type MutationLog = Arc<Mutex<Vec<MutationRequest>>>;

pub struct FakeCharacterService {
    characters: Mutex<HashMap<u32, Character>>,
    log: MutationLog,
    fail: AtomicBool,
}

impl FakeCharacterService {
    pub fn new(log: MutationLog) -> Self {
        Self {
            characters: Mutex::new(HashMap::new()),
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn put(&self, character: Character) {
        self.characters.lock().insert(character.id, character);
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CharacterService for FakeCharacterService {
    async fn get_by_id(&self, _tenant: &Tenant, character_id: u32) -> Result<Character> {
        self.characters
            .lock()
            .get(&character_id)
            .cloned()
            .ok_or(ShopError::CharacterNotFound { character_id })
    }

    async fn request_change_meso(
        &self,
        _tenant: &Tenant,
        world_id: u8,
        character_id: u32,
        actor_id: u32,
        actor_type: &str,
        amount: i32,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ShopError::Collaborator("角色服务不可用".to_string()));
        }
        self.log.lock().push(MutationRequest::ChangeMeso {
            character_id,
            world_id,
            actor_id,
            actor_type: actor_type.to_string(),
            amount,
        });
        Ok(())
    }
}

pub struct FakeCompartmentService {
    log: MutationLog,
    fail: AtomicBool,
}

impl FakeCompartmentService {
    pub fn new(log: MutationLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, request: MutationRequest) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ShopError::Collaborator("背包服务不可用".to_string()));
        }
        self.log.lock().push(request);
        Ok(())
    }
}

#[async_trait]
impl CompartmentService for FakeCompartmentService {
    async fn request_create_item(
        &self,
        _tenant: &Tenant,
        character_id: u32,
        template_id: u32,
        quantity: u32,
    ) -> Result<()> {
        self.record(MutationRequest::CreateItem {
            character_id,
            template_id,
            quantity,
        })
    }

    async fn request_destroy_item(
        &self,
        _tenant: &Tenant,
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    ) -> Result<()> {
        self.record(MutationRequest::DestroyItem {
            character_id,
            inventory_type,
            slot,
            quantity,
        })
    }

    async fn request_recharge_item(
        &self,
        _tenant: &Tenant,
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    ) -> Result<()> {
        self.record(MutationRequest::RechargeItem {
            character_id,
            inventory_type,
            slot,
            quantity,
        })
    }
}

/// 内存物品目录；未登记的模板返回 `CatalogEntryNotFound`
#[derive(Default)]
pub struct FakeItemCatalog {
    equipables: Mutex<HashMap<u32, EquipableEntry>>,
    consumables: Mutex<HashMap<u32, ConsumableEntry>>,
    setups: Mutex<HashMap<u32, SetupEntry>>,
    etcs: Mutex<HashMap<u32, EtcEntry>>,
}

impl FakeItemCatalog {
    pub fn put_equipable(&self, template_id: u32, entry: EquipableEntry) {
        self.equipables.lock().insert(template_id, entry);
    }

    pub fn put_consumable(&self, template_id: u32, entry: ConsumableEntry) {
        self.consumables.lock().insert(template_id, entry);
    }

    pub fn put_setup(&self, template_id: u32, entry: SetupEntry) {
        self.setups.lock().insert(template_id, entry);
    }

    pub fn put_etc(&self, template_id: u32, entry: EtcEntry) {
        self.etcs.lock().insert(template_id, entry);
    }
}

fn lookup<T: Clone>(entries: &Mutex<HashMap<u32, T>>, template_id: u32) -> Result<T> {
    entries
        .lock()
        .get(&template_id)
        .cloned()
        .ok_or(ShopError::CatalogEntryNotFound { template_id })
}

#[async_trait]
impl ItemCatalog for FakeItemCatalog {
    async fn equipable(&self, _tenant: &Tenant, template_id: u32) -> Result<EquipableEntry> {
        lookup(&self.equipables, template_id)
    }

    async fn consumable(&self, _tenant: &Tenant, template_id: u32) -> Result<ConsumableEntry> {
        lookup(&self.consumables, template_id)
    }

    async fn setup(&self, _tenant: &Tenant, template_id: u32) -> Result<SetupEntry> {
        lookup(&self.setups, template_id)
    }

    async fn etc(&self, _tenant: &Tenant, template_id: u32) -> Result<EtcEntry> {
        lookup(&self.etcs, template_id)
    }

    /// 登记过且标记为可充值的消耗品
    async fn rechargeable_consumables(
        &self,
        _tenant: &Tenant,
    ) -> Result<Vec<RechargeableCatalogEntry>> {
        let mut entries: Vec<RechargeableCatalogEntry> = self
            .consumables
            .lock()
            .iter()
            .filter(|(_, entry)| entry.rechargeable)
            .map(|(template_id, entry)| RechargeableCatalogEntry {
                template_id: *template_id,
                unit_price: entry.unit_price,
                slot_max: entry.slot_max,
            })
            .collect();
        entries.sort_by_key(|e| e.template_id);
        Ok(entries)
    }
}

/// 内存技能表；未登记的技能等级为 0
#[derive(Default)]
pub struct FakeSkillService {
    levels: Mutex<HashMap<(u32, u32), u8>>,
    fail: AtomicBool,
}

impl FakeSkillService {
    pub fn set_level(&self, character_id: u32, skill_id: u32, level: u8) {
        self.levels.lock().insert((character_id, skill_id), level);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SkillService for FakeSkillService {
    async fn skill_level(&self, _tenant: &Tenant, character_id: u32, skill_id: u32) -> Result<u8> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ShopError::Collaborator("技能服务不可用".to_string()));
        }
        Ok(self
            .levels
            .lock()
            .get(&(character_id, skill_id))
            .copied()
            .unwrap_or(0))
    }
}

// ==================== 组装 ====================

/// 使用内存替身组装的完整处理器
pub struct TestHarness {
    pub tenant: Tenant,
    pub registry: Arc<ShopRegistry>,
    pub repository: Arc<MemoryCommodityRepository>,
    pub cache: Arc<ConsumableCache>,
    pub characters: Arc<FakeCharacterService>,
    pub compartments: Arc<FakeCompartmentService>,
    pub catalog: Arc<FakeItemCatalog>,
    pub skills: Arc<FakeSkillService>,
    pub producer: Arc<RecordingProducer>,
    pub mutations: MutationLog,
    pub processor: ShopProcessor,
}

impl TestHarness {
    pub fn new() -> Self {
        let mutations: MutationLog = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(ShopRegistry::new());
        let repository = Arc::new(MemoryCommodityRepository::new());
        let characters = Arc::new(FakeCharacterService::new(mutations.clone()));
        let compartments = Arc::new(FakeCompartmentService::new(mutations.clone()));
        let catalog = Arc::new(FakeItemCatalog::default());
        let skills = Arc::new(FakeSkillService::default());
        let producer = Arc::new(RecordingProducer::default());
        let cache = Arc::new(ConsumableCache::new(catalog.clone()));

        let processor = ShopProcessor::new(
            registry.clone(),
            repository.clone(),
            EnrichmentPipeline::standard(catalog.clone(), cache.clone()),
            Collaborators {
                characters: characters.clone(),
                compartments: compartments.clone(),
                catalog: catalog.clone(),
                skills: skills.clone(),
                producer: producer.clone(),
            },
        );

        Self {
            tenant: test_tenant(),
            registry,
            repository,
            cache,
            characters,
            compartments,
            catalog,
            skills,
            producer,
            mutations,
            processor,
        }
    }

    /// 直接写入仓储的商店
    pub async fn seed_shop(
        &self,
        npc_id: u32,
        recharger: bool,
        commodities: Vec<CommodityAttributes>,
    ) -> Shop {
        match self
            .repository
            .replace_shop(&self.tenant, npc_id, recharger, commodities)
            .await
        {
            Ok(shop) => shop,
            Err(e) => panic!("写入测试商店失败: {e}"),
        }
    }

    /// 不经过处理器直接登记角色在店
    pub async fn enter(&self, character_id: u32, npc_id: u32) {
        self.registry.add_character(&self.tenant, character_id, npc_id);
    }

    pub fn requests(&self) -> Vec<MutationRequest> {
        self.mutations.lock().clone()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
