//! 商店命令与状态事件
//!
//! 入站命令和出站状态事件的消息格式均为 `{characterId, type, body}`。
//! 交易处理过程中产生的状态事件先写入 `MessageBuffer`，由调用方在处理结束后统一发送。

use std::fmt;

use npc_shared::error::NpcError;
use npc_shared::kafka::{MessageProducer, send_json, topics};
use npc_shared::tenant::Tenant;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 入站命令
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopCommand {
    pub character_id: u32,
    #[serde(flatten)]
    pub kind: ShopCommandKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShopCommandKind {
    #[serde(rename_all = "camelCase")]
    Enter { npc_template_id: u32 },
    Exit {},
    #[serde(rename_all = "camelCase")]
    Buy {
        slot: u16,
        item_template_id: u32,
        quantity: u32,
        discount_price: u32,
    },
    #[serde(rename_all = "camelCase")]
    Sell {
        slot: i16,
        item_template_id: u32,
        quantity: u32,
    },
    Recharge { slot: u16 },
}

// ---------------------------------------------------------------------------
// 出站状态事件
// ---------------------------------------------------------------------------

/// 交易失败的错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    OutOfStock,
    NotEnoughMoney,
    InventoryFull,
    #[serde(rename = "OUT_OF_STOCK_2")]
    OutOfStock2,
    #[serde(rename = "OUT_OF_STOCK_3")]
    OutOfStock3,
    #[serde(rename = "NOT_ENOUGH_MONEY_2")]
    NotEnoughMoney2,
    NeedMoreItems,
    OverLevelRequirement,
    UnderLevelRequirement,
    TradeLimit,
    GenericError,
    GenericErrorWithReason,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::NotEnoughMoney => "NOT_ENOUGH_MONEY",
            Self::InventoryFull => "INVENTORY_FULL",
            Self::OutOfStock2 => "OUT_OF_STOCK_2",
            Self::OutOfStock3 => "OUT_OF_STOCK_3",
            Self::NotEnoughMoney2 => "NOT_ENOUGH_MONEY_2",
            Self::NeedMoreItems => "NEED_MORE_ITEMS",
            Self::OverLevelRequirement => "OVER_LEVEL_REQUIREMENT",
            Self::UnderLevelRequirement => "UNDER_LEVEL_REQUIREMENT",
            Self::TradeLimit => "TRADE_LIMIT",
            Self::GenericError => "GENERIC_ERROR",
            Self::GenericErrorWithReason => "GENERIC_ERROR_WITH_REASON",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub character_id: u32,
    #[serde(flatten)]
    pub kind: StatusEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusEventKind {
    #[serde(rename_all = "camelCase")]
    Entered { npc_template_id: u32 },
    Exited {},
    #[serde(rename_all = "camelCase")]
    Error {
        error: ErrorCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level_limit: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl StatusEvent {
    pub fn entered(character_id: u32, npc_template_id: u32) -> Self {
        Self {
            character_id,
            kind: StatusEventKind::Entered { npc_template_id },
        }
    }

    pub fn exited(character_id: u32) -> Self {
        Self {
            character_id,
            kind: StatusEventKind::Exited {},
        }
    }

    pub fn error(character_id: u32, error: ErrorCode) -> Self {
        Self {
            character_id,
            kind: StatusEventKind::Error {
                error,
                level_limit: None,
                reason: None,
            },
        }
    }

    pub fn error_with_reason(character_id: u32, reason: impl Into<String>) -> Self {
        Self {
            character_id,
            kind: StatusEventKind::Error {
                error: ErrorCode::GenericErrorWithReason,
                level_limit: None,
                reason: Some(reason.into()),
            },
        }
    }

    /// 错误事件的错误码，非错误事件返回 None
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.kind {
            StatusEventKind::Error { error, .. } => Some(*error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageBuffer
// ---------------------------------------------------------------------------

/// 单次交易的出站事件累积器
#[derive(Debug, Default)]
pub struct MessageBuffer {
    events: Vec<StatusEvent>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, event: StatusEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[StatusEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 按写入顺序发送全部事件，遇到失败立即返回
    pub async fn flush(
        self,
        producer: &dyn MessageProducer,
        tenant: &Tenant,
    ) -> Result<usize, NpcError> {
        let count = self.events.len();
        for event in &self.events {
            send_json(
                producer,
                tenant,
                topics::NPC_SHOP_STATUS_EVENTS,
                &event.character_id.to_string(),
                event,
            )
            .await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingProducer, test_tenant};
    use serde_json::json;

    #[test]
    fn test_decode_commands() {
        let buy: ShopCommand = serde_json::from_value(json!({
            "characterId": 1000,
            "type": "BUY",
            "body": {"slot": 0, "itemTemplateId": 2000000, "quantity": 10, "discountPrice": 0}
        }))
        .unwrap();
        assert_eq!(
            buy.kind,
            ShopCommandKind::Buy {
                slot: 0,
                item_template_id: 2000000,
                quantity: 10,
                discount_price: 0,
            }
        );

        let exit: ShopCommand =
            serde_json::from_value(json!({"characterId": 1000, "type": "EXIT", "body": {}}))
                .unwrap();
        assert_eq!(exit.kind, ShopCommandKind::Exit {});

        let sell: ShopCommand = serde_json::from_value(json!({
            "characterId": 1000,
            "type": "SELL",
            "body": {"slot": -1, "itemTemplateId": 4000000, "quantity": 1}
        }))
        .unwrap();
        assert!(matches!(sell.kind, ShopCommandKind::Sell { slot: -1, .. }));
    }

    #[test]
    fn test_unknown_command_type_is_rejected() {
        let result = serde_json::from_value::<ShopCommand>(json!({
            "characterId": 1000,
            "type": "BARTER",
            "body": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_event_wire_format() {
        assert_eq!(
            serde_json::to_value(StatusEvent::entered(1000, 2001)).unwrap(),
            json!({"characterId": 1000, "type": "ENTERED", "body": {"npcTemplateId": 2001}})
        );
        assert_eq!(
            serde_json::to_value(StatusEvent::exited(1000)).unwrap(),
            json!({"characterId": 1000, "type": "EXITED", "body": {}})
        );
        assert_eq!(
            serde_json::to_value(StatusEvent::error(1000, ErrorCode::NotEnoughMoney2)).unwrap(),
            json!({"characterId": 1000, "type": "ERROR", "body": {"error": "NOT_ENOUGH_MONEY_2"}})
        );
        assert_eq!(
            serde_json::to_value(StatusEvent::error_with_reason(1000, "not implemented")).unwrap(),
            json!({
                "characterId": 1000,
                "type": "ERROR",
                "body": {"error": "GENERIC_ERROR_WITH_REASON", "reason": "not implemented"}
            })
        );
    }

    #[test]
    fn test_error_code_names_match_wire_format() {
        for code in [
            ErrorCode::OutOfStock2,
            ErrorCode::NotEnoughMoney2,
            ErrorCode::UnderLevelRequirement,
            ErrorCode::GenericErrorWithReason,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
        }
    }

    #[tokio::test]
    async fn test_flush_sends_in_order() {
        let producer = RecordingProducer::default();
        let mut buffer = MessageBuffer::new();
        buffer.put(StatusEvent::entered(1000, 2001));
        buffer.put(StatusEvent::exited(1000));

        let sent = buffer.flush(&producer, &test_tenant()).await.unwrap();

        assert_eq!(sent, 2);
        let messages = producer.sent();
        assert_eq!(messages[0].topic, topics::NPC_SHOP_STATUS_EVENTS);
        assert_eq!(messages[0].json()["type"], "ENTERED");
        assert_eq!(messages[1].json()["type"], "EXITED");
    }
}
