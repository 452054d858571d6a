//! NPC 商店服务
//!
//! 消费商店命令与角色状态事件，驱动商店交易处理器。

use std::sync::Arc;

use anyhow::Result;
use npc_shared::config::AppConfig;
use npc_shared::kafka::{KafkaProducer, MessageProducer};
use npc_shared::observability;
use npc_shared::rest::RestClient;
use tokio::sync::watch;
use tracing::{error, info, warn};

use npc_shop_service::{
    catalog::{ItemCatalog, RestItemCatalog},
    character::RestCharacterService,
    compartment::CommandCompartmentService,
    consumable_cache::ConsumableCache,
    consumer::ShopConsumer,
    decorator::EnrichmentPipeline,
    processor::{Collaborators, ShopProcessor},
    registry::ShopRegistry,
    repository::MemoryCommodityRepository,
    skill::RestSkillService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置，失败时使用默认值
    let config = AppConfig::load("npc-shop-service").unwrap_or_else(|e| {
        warn!("加载配置失败，使用默认配置: {e}");
        AppConfig::default()
    });

    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "Starting npc-shop-service..."
    );

    // 2. 出站消息与下游 REST 客户端
    let producer: Arc<dyn MessageProducer> = Arc::new(KafkaProducer::new(&config.kafka)?);
    let timeout = config.services.request_timeout();
    let characters_rest = RestClient::new("characters", &config.services.characters_url, timeout)?;
    let data_rest = RestClient::new("data", &config.services.data_url, timeout)?;
    let skills_rest = RestClient::new("skills", &config.services.skills_url, timeout)?;

    // 3. 协作服务
    let catalog: Arc<dyn ItemCatalog> = Arc::new(RestItemCatalog::new(data_rest));
    let collaborators = Collaborators {
        characters: Arc::new(RestCharacterService::new(characters_rest, producer.clone())),
        compartments: Arc::new(CommandCompartmentService::new(producer.clone())),
        catalog: catalog.clone(),
        skills: Arc::new(RestSkillService::new(skills_rest)),
        producer,
    };

    // 4. 登记表、缓存与处理器
    let cache = Arc::new(ConsumableCache::new(catalog.clone()));
    let processor = Arc::new(ShopProcessor::new(
        Arc::new(ShopRegistry::new()),
        Arc::new(MemoryCommodityRepository::new()),
        EnrichmentPipeline::standard(catalog, cache),
        collaborators,
    ));
    warn!("商品仓储为内存实现，重启后商店数据丢失");

    // 5. 启动消费者
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = ShopConsumer::new(&config, processor)?;
    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = consumer.run(shutdown_rx).await {
            error!(error = %e, "商店消费者异常退出");
        }
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = consumer_handle.await {
        error!(error = %e, "等待消费者退出失败");
    }

    info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
