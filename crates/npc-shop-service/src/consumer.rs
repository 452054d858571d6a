//! Kafka 消费者与命令分发
//!
//! - 商店命令 topic：解码 `ShopCommand` 后分发到处理器的 `*_and_emit` 入口
//! - 角色状态 topic：角色登出、换图、换频道时自动离店
//!
//! 单条消息的处理拆分为独立函数，测试时无需 broker。

use npc_shared::kafka::ConsumerMessage;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, ShopError};
use crate::message::{ShopCommand, ShopCommandKind};
use crate::processor::ShopProcessor;

pub const STATUS_LOGOUT: &str = "LOGOUT";
pub const STATUS_MAP_CHANGED: &str = "MAP_CHANGED";
pub const STATUS_CHANNEL_CHANGED: &str = "CHANNEL_CHANGED";

/// 角色服务发布的状态事件，只关心类型
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStatusEvent {
    pub character_id: u32,
    #[serde(default)]
    pub world_id: u8,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub body: Value,
}

impl CharacterStatusEvent {
    /// 角色离开当前场景，需要同时离开商店
    pub fn leaves_shop(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            STATUS_LOGOUT | STATUS_MAP_CHANGED | STATUS_CHANNEL_CHANGED
        )
    }
}

/// 处理一条商店命令
pub async fn handle_command_message(processor: &ShopProcessor, msg: &ConsumerMessage) -> Result<()> {
    let tenant = msg.tenant()?;
    let command: ShopCommand = msg
        .deserialize_payload()
        .map_err(|e| ShopError::MalformedMessage(format!("商店命令解码失败: {e}")))?;

    debug!(tenant = %tenant, character_id = command.character_id, kind = ?command.kind, "收到商店命令");

    let character_id = command.character_id;
    match command.kind {
        ShopCommandKind::Enter { npc_template_id } => {
            processor
                .enter_and_emit(&tenant, character_id, npc_template_id)
                .await
        }
        ShopCommandKind::Exit {} => processor.exit_and_emit(&tenant, character_id).await,
        ShopCommandKind::Buy {
            slot,
            item_template_id,
            quantity,
            discount_price,
        } => {
            processor
                .buy_and_emit(
                    &tenant,
                    character_id,
                    slot,
                    item_template_id,
                    quantity,
                    discount_price,
                )
                .await
        }
        ShopCommandKind::Sell {
            slot,
            item_template_id,
            quantity,
        } => {
            processor
                .sell_and_emit(&tenant, character_id, slot, item_template_id, quantity)
                .await
        }
        ShopCommandKind::Recharge { slot } => {
            processor
                .recharge_and_emit(&tenant, character_id, slot)
                .await
        }
    }
}

/// 处理一条角色状态事件，只有离开场景类事件会触发离店
pub async fn handle_character_status_message(
    processor: &ShopProcessor,
    msg: &ConsumerMessage,
) -> Result<()> {
    let tenant = msg.tenant()?;
    let event: CharacterStatusEvent = msg
        .deserialize_payload()
        .map_err(|e| ShopError::MalformedMessage(format!("角色状态事件解码失败: {e}")))?;

    if !event.leaves_shop() {
        return Ok(());
    }

    info!(
        tenant = %tenant,
        character_id = event.character_id,
        event_type = %event.event_type,
        "角色离开场景，自动离店"
    );
    processor.exit_and_emit(&tenant, event.character_id).await
}

#[cfg(feature = "kafka")]
pub use self::runner::ShopConsumer;

#[cfg(feature = "kafka")]
mod runner {
    use std::sync::Arc;

    use npc_shared::config::AppConfig;
    use npc_shared::kafka::{KafkaConsumer, topics};
    use tokio::sync::watch;
    use tracing::{error, info};

    use super::{handle_character_status_message, handle_command_message};
    use crate::error::Result;
    use crate::processor::ShopProcessor;

    /// 商店命令与角色状态两条消费管道
    pub struct ShopConsumer {
        commands: KafkaConsumer,
        character_status: KafkaConsumer,
        processor: Arc<ShopProcessor>,
    }

    impl ShopConsumer {
        pub fn new(config: &AppConfig, processor: Arc<ShopProcessor>) -> Result<Self> {
            Ok(Self {
                commands: KafkaConsumer::new(&config.kafka, Some("commands"))?,
                character_status: KafkaConsumer::new(&config.kafka, Some("character-status"))?,
                processor,
            })
        }

        /// 启动两个消费循环，直到收到 shutdown 信号
        pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
            self.commands.subscribe(&[topics::NPC_SHOP_COMMANDS])?;
            self.character_status
                .subscribe(&[topics::CHARACTER_STATUS_EVENTS])?;

            info!(
                commands = topics::NPC_SHOP_COMMANDS,
                status = topics::CHARACTER_STATUS_EVENTS,
                "商店消费者已启动"
            );

            let processor = self.processor;
            let commands = self.commands.start(shutdown.clone(), |msg| {
                let processor = processor.clone();
                async move {
                    if let Err(e) = handle_command_message(&processor, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "处理商店命令失败"
                        );
                    }
                    Ok(())
                }
            });
            let status = self.character_status.start(shutdown, |msg| {
                let processor = processor.clone();
                async move {
                    if let Err(e) = handle_character_status_message(&processor, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            offset = msg.offset,
                            "处理角色状态事件失败"
                        );
                    }
                    Ok(())
                }
            });

            tokio::join!(commands, status);

            info!("商店消费者已停止");
            Ok(())
        }
    }
}
