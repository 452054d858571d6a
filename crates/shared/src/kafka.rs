//! Kafka 基础设施封装
//!
//! 将消息发送抽象为 `MessageProducer` trait，业务代码只依赖该 trait。
//! rdkafka 的 Producer/Consumer 实现位于 `kafka` feature 之后，
//! 未开启时仍可使用 `ConsumerMessage` 和 topic 常量编写与测试消息处理逻辑。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::NpcError;
use crate::tenant::Tenant;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称，防止字符串散落在各服务中导致拼写不一致
pub mod topics {
    pub const NPC_SHOP_COMMANDS: &str = "npc.shop.commands";
    pub const NPC_SHOP_STATUS_EVENTS: &str = "npc.shop.status.events";
    pub const CHARACTER_COMMANDS: &str = "character.commands";
    pub const CHARACTER_STATUS_EVENTS: &str = "character.status.events";
    pub const COMPARTMENT_COMMANDS: &str = "compartment.commands";
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 拥有所有字段的所有权，可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, NpcError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| NpcError::Kafka(format!("负载反序列化失败: {e}")))
    }

    /// 从消息头解析租户
    pub fn tenant(&self) -> Result<Tenant, NpcError> {
        Tenant::from_headers(&self.headers)
    }
}

// ---------------------------------------------------------------------------
// MessageProducer
// ---------------------------------------------------------------------------

/// 出站消息发送接口
///
/// 状态事件和发往其他服务的变更请求都经由此接口投递。
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<(), NpcError>;
}

/// 将值序列化为 JSON 后发送，并附带租户消息头
pub async fn send_json<T: Serialize + ?Sized>(
    producer: &dyn MessageProducer,
    tenant: &Tenant,
    topic: &str,
    key: &str,
    value: &T,
) -> Result<(), NpcError> {
    let payload = serde_json::to_vec(value)?;
    producer.send(topic, key, &payload, &tenant.to_headers()).await
}

#[cfg(feature = "kafka")]
pub use self::rd::{KafkaConsumer, KafkaProducer};

#[cfg(feature = "kafka")]
mod rd {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::consumer::{Consumer, StreamConsumer};
    use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use tokio::sync::watch;
    use tracing::{debug, error, info, warn};

    use super::{ConsumerMessage, MessageProducer};
    use crate::config::KafkaConfig;
    use crate::error::NpcError;

    impl ConsumerMessage {
        /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
        fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
            let key = msg
                .key()
                .and_then(|k| std::str::from_utf8(k).ok())
                .map(String::from);

            let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

            let mut headers = HashMap::new();
            if let Some(h) = msg.headers() {
                for header in h.iter() {
                    if let Some(raw) = header.value
                        && let Ok(value) = std::str::from_utf8(raw)
                    {
                        headers.insert(header.key.to_string(), value.to_string());
                    }
                }
            }

            Self {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                key,
                payload,
                timestamp: msg.timestamp().to_millis(),
                headers,
            }
        }
    }

    /// 基于 `FutureProducer` 的生产者，Clone 开销很小
    #[derive(Clone)]
    pub struct KafkaProducer {
        producer: FutureProducer,
    }

    impl KafkaProducer {
        pub fn new(config: &KafkaConfig) -> Result<Self, NpcError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", &config.brokers)
                .set("message.timeout.ms", "5000")
                .create()
                .map_err(|e| NpcError::Kafka(format!("创建生产者失败: {e}")))?;

            info!(brokers = %config.brokers, "Kafka 生产者已初始化");
            Ok(Self { producer })
        }
    }

    #[async_trait]
    impl MessageProducer for KafkaProducer {
        async fn send(
            &self,
            topic: &str,
            key: &str,
            payload: &[u8],
            headers: &HashMap<String, String>,
        ) -> Result<(), NpcError> {
            let mut owned = OwnedHeaders::new();
            for (name, value) in headers {
                owned = owned.insert(Header {
                    key: name,
                    value: Some(value.as_bytes()),
                });
            }

            let record = FutureRecord::to(topic)
                .key(key)
                .payload(payload)
                .headers(owned);

            let delivery = self
                .producer
                .send(record, Duration::from_secs(5))
                .await
                .map_err(|(e, _)| NpcError::Kafka(format!("发送消息失败: {e}")))?;

            debug!(
                topic,
                key,
                partition = delivery.partition,
                offset = delivery.offset,
                "消息已发送"
            );
            Ok(())
        }
    }

    /// 基于 `StreamConsumer` 的消费者，通过 `watch` channel 优雅关闭
    pub struct KafkaConsumer {
        consumer: StreamConsumer,
    }

    impl KafkaConsumer {
        /// `group_id_suffix` 允许同一服务内不同消费逻辑使用独立的消费组
        pub fn new(config: &KafkaConfig, group_id_suffix: Option<&str>) -> Result<Self, NpcError> {
            let group_id = match group_id_suffix {
                Some(suffix) => format!("{}.{}", config.consumer_group, suffix),
                None => config.consumer_group.clone(),
            };

            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &config.brokers)
                .set("group.id", &group_id)
                .set("auto.offset.reset", &config.auto_offset_reset)
                .set("enable.auto.commit", "true")
                .create()
                .map_err(|e| NpcError::Kafka(format!("创建消费者失败: {e}")))?;

            info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
            Ok(Self { consumer })
        }

        pub fn subscribe(&self, topics: &[&str]) -> Result<(), NpcError> {
            self.consumer
                .subscribe(topics)
                .map_err(|e| NpcError::Kafka(format!("订阅 topic 失败: {e}")))?;

            info!(?topics, "已订阅 Kafka topics");
            Ok(())
        }

        /// 启动消费循环
        ///
        /// handler 返回错误只记录日志而不中断循环；关闭信号变为 `true` 时退出。
        pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
        where
            F: Fn(ConsumerMessage) -> Fut,
            Fut: std::future::Future<Output = Result<(), NpcError>>,
        {
            use futures::StreamExt;

            let stream = self.consumer.stream();
            futures::pin_mut!(stream);

            info!("Kafka 消费循环已启动");

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("收到关闭信号，Kafka 消费循环退出");
                            break;
                        }
                    }

                    msg_result = stream.next() => {
                        let Some(msg_result) = msg_result else {
                            warn!("Kafka 消息流意外结束");
                            break;
                        };

                        match msg_result {
                            Ok(borrowed_msg) => {
                                let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                                debug!(
                                    topic = %msg.topic,
                                    partition = msg.partition,
                                    offset = msg.offset,
                                    "收到 Kafka 消息"
                                );

                                if let Err(e) = handler(msg).await {
                                    error!(error = %e, "处理 Kafka 消息失败");
                                }
                            }
                            Err(e) => {
                                error!(error = %e, "接收 Kafka 消息出错");
                            }
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
