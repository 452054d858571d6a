//! 共享库
//!
//! 包含各服务共用的配置、错误处理、租户上下文、Kafka 消息、REST 客户端与可观测性基础设施代码。

pub mod config;
pub mod error;
pub mod kafka;
pub mod observability;
pub mod rest;
pub mod tenant;
