//! 背包变更请求
//!
//! 创建、销毁、充值物品都以命令形式发往背包服务，发出即返回。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use npc_shared::kafka::{MessageProducer, send_json, topics};
use npc_shared::tenant::Tenant;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShopError};
use crate::inventory::InventoryType;

pub const COMMAND_CREATE_ASSET: &str = "CREATE_ASSET";
pub const COMMAND_DESTROY: &str = "DESTROY";
pub const COMMAND_RECHARGE: &str = "RECHARGE";

/// 背包服务能力
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompartmentService: Send + Sync {
    /// 请求创建物品，背包分类由模板 ID 推导
    async fn request_create_item(
        &self,
        tenant: &Tenant,
        character_id: u32,
        template_id: u32,
        quantity: u32,
    ) -> Result<()>;

    async fn request_destroy_item(
        &self,
        tenant: &Tenant,
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    ) -> Result<()>;

    async fn request_recharge_item(
        &self,
        tenant: &Tenant,
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// 命令消息
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompartmentCommand<B> {
    pub character_id: u32,
    pub inventory_type: InventoryType,
    #[serde(rename = "type")]
    pub command_type: String,
    pub body: B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetBody {
    pub template_id: u32,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    pub owner_id: u32,
    pub flag: u16,
    pub rechargeable: u64,
}

/// 销毁与充值共用的请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuantityBody {
    pub slot: i16,
    pub quantity: u32,
}

// ---------------------------------------------------------------------------
// Kafka 实现
// ---------------------------------------------------------------------------

pub struct CommandCompartmentService {
    producer: Arc<dyn MessageProducer>,
}

impl CommandCompartmentService {
    pub fn new(producer: Arc<dyn MessageProducer>) -> Self {
        Self { producer }
    }

    async fn send<B: Serialize + Send + Sync>(
        &self,
        tenant: &Tenant,
        command: CompartmentCommand<B>,
    ) -> Result<()> {
        send_json(
            self.producer.as_ref(),
            tenant,
            topics::COMPARTMENT_COMMANDS,
            &command.character_id.to_string(),
            &command,
        )
        .await?;

        debug!(
            character_id = command.character_id,
            inventory_type = %command.inventory_type,
            command_type = %command.command_type,
            "已发送背包命令"
        );
        Ok(())
    }
}

#[async_trait]
impl CompartmentService for CommandCompartmentService {
    async fn request_create_item(
        &self,
        tenant: &Tenant,
        character_id: u32,
        template_id: u32,
        quantity: u32,
    ) -> Result<()> {
        let inventory_type = InventoryType::from_template_id(template_id)
            .ok_or(ShopError::InvalidTemplate { template_id })?;

        self.send(
            tenant,
            CompartmentCommand {
                character_id,
                inventory_type,
                command_type: COMMAND_CREATE_ASSET.to_string(),
                body: CreateAssetBody {
                    template_id,
                    quantity,
                    expiration: None,
                    owner_id: 0,
                    flag: 0,
                    rechargeable: 0,
                },
            },
        )
        .await
    }

    async fn request_destroy_item(
        &self,
        tenant: &Tenant,
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    ) -> Result<()> {
        self.send(
            tenant,
            CompartmentCommand {
                character_id,
                inventory_type,
                command_type: COMMAND_DESTROY.to_string(),
                body: SlotQuantityBody { slot, quantity },
            },
        )
        .await
    }

    async fn request_recharge_item(
        &self,
        tenant: &Tenant,
        character_id: u32,
        inventory_type: InventoryType,
        slot: i16,
        quantity: u32,
    ) -> Result<()> {
        self.send(
            tenant,
            CompartmentCommand {
                character_id,
                inventory_type,
                command_type: COMMAND_RECHARGE.to_string(),
                body: SlotQuantityBody { slot, quantity },
            },
        )
        .await
    }
}
