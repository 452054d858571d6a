//! NPC 商店交易服务
//!
//! 角色进入 NPC 商店后可购买、出售、充值物品。本服务维护"谁在哪个商店"的登记表，
//! 在读取商店时用物品目录补全商品的派生字段，并把交易校验结果作为状态事件发出。
//! 金币和背包的实际变更以命令形式交给角色服务、背包服务异步完成。

pub mod catalog;
pub mod character;
pub mod compartment;
pub mod consumable_cache;
pub mod consumer;
pub mod decorator;
pub mod error;
pub mod inventory;
pub mod message;
pub mod processor;
pub mod registry;
pub mod repository;
pub mod shop;
pub mod skill;
pub mod test_utils;
