//! 角色服务客户端
//!
//! 查询走角色服务的 REST 接口；金币变更是发往角色命令 topic 的请求，
//! 发出即视为完成，不等待下游结果。

use std::sync::Arc;

use async_trait::async_trait;
use npc_shared::error::NpcError;
use npc_shared::kafka::{MessageProducer, send_json, topics};
use npc_shared::rest::RestClient;
use npc_shared::tenant::Tenant;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShopError};
use crate::inventory::{Character, Inventory};

/// 商店发起金币变更时使用的操作方类型
pub const ACTOR_TYPE_SHOP: &str = "SHOP";

pub const COMMAND_REQUEST_CHANGE_MESO: &str = "REQUEST_CHANGE_MESO";

/// 角色服务能力
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterService: Send + Sync {
    /// 获取角色及其背包
    async fn get_by_id(&self, tenant: &Tenant, character_id: u32) -> Result<Character>;

    /// 请求变更金币，`amount` 为有符号增量
    async fn request_change_meso(
        &self,
        tenant: &Tenant,
        world_id: u8,
        character_id: u32,
        actor_id: u32,
        actor_type: &str,
        amount: i32,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// 命令消息
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCommand<B> {
    pub world_id: u8,
    pub character_id: u32,
    #[serde(rename = "type")]
    pub command_type: String,
    pub body: B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChangeMesoBody {
    pub actor_id: u32,
    pub actor_type: String,
    pub amount: i32,
}

// ---------------------------------------------------------------------------
// REST + Kafka 实现
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharacterAttributes {
    world_id: u8,
    meso: u32,
}

pub struct RestCharacterService {
    rest: RestClient,
    producer: Arc<dyn MessageProducer>,
}

impl RestCharacterService {
    pub fn new(rest: RestClient, producer: Arc<dyn MessageProducer>) -> Self {
        Self { rest, producer }
    }
}

#[async_trait]
impl CharacterService for RestCharacterService {
    async fn get_by_id(&self, tenant: &Tenant, character_id: u32) -> Result<Character> {
        let character = self
            .rest
            .get_one::<CharacterAttributes>(tenant, &format!("characters/{character_id}"))
            .await
            .map_err(|e| match e {
                NpcError::NotFound { .. } => ShopError::CharacterNotFound { character_id },
                other => ShopError::Shared(other),
            })?;

        let inventory = self
            .rest
            .get_one::<Inventory>(tenant, &format!("characters/{character_id}/inventory"))
            .await?;

        Ok(Character {
            id: character_id,
            world_id: character.attributes.world_id,
            meso: character.attributes.meso,
            inventory: inventory.attributes,
        })
    }

    async fn request_change_meso(
        &self,
        tenant: &Tenant,
        world_id: u8,
        character_id: u32,
        actor_id: u32,
        actor_type: &str,
        amount: i32,
    ) -> Result<()> {
        let command = CharacterCommand {
            world_id,
            character_id,
            command_type: COMMAND_REQUEST_CHANGE_MESO.to_string(),
            body: RequestChangeMesoBody {
                actor_id,
                actor_type: actor_type.to_string(),
                amount,
            },
        };

        send_json(
            self.producer.as_ref(),
            tenant,
            topics::CHARACTER_COMMANDS,
            &character_id.to_string(),
            &command,
        )
        .await?;

        debug!(character_id, amount, "已请求变更金币");
        Ok(())
    }
}
