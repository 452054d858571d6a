//! NPC 商店服务专用错误类型
//!
//! 校验类失败（余额不足、背包已满等）不走错误通道，而是转换为状态事件；
//! 这里只包含需要返回给调用方的硬错误。

use npc_shared::error::NpcError;

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    /// 进入商店时 NPC 没有对应的商店
    #[error("商店不存在: npc_id={npc_id}")]
    ShopNotFound { npc_id: u32 },

    #[error("商品不存在: commodity_id={commodity_id}")]
    CommodityNotFound { commodity_id: uuid::Uuid },

    #[error("角色不存在: character_id={character_id}")]
    CharacterNotFound { character_id: u32 },

    #[error("物品目录中不存在: template_id={template_id}")]
    CatalogEntryNotFound { template_id: u32 },

    /// 模板 ID 无法映射到任何背包分类
    #[error("无效的物品模板: template_id={template_id}")]
    InvalidTemplate { template_id: u32 },

    /// 下游服务调用失败
    #[error("协作服务调用失败: {0}")]
    Collaborator(String),

    #[error("消息格式错误: {0}")]
    MalformedMessage(String),

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] NpcError),
}

pub type Result<T> = std::result::Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShopError::ShopNotFound { npc_id: 2001 };
        assert_eq!(err.to_string(), "商店不存在: npc_id=2001");

        let err = ShopError::InvalidTemplate { template_id: 3001 };
        assert_eq!(err.to_string(), "无效的物品模板: template_id=3001");

        let shared_err = NpcError::Kafka("broker 不可达".to_string());
        let err = ShopError::Shared(shared_err);
        assert_eq!(err.to_string(), "Kafka 错误: broker 不可达");
    }
}
