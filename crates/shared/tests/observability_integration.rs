//! 可观测性模块集成测试
//!
//! 使用本地 Prometheus recorder 验证指标名称与标签，并检查日志过滤器的回退行为。

mod metrics_tests {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use npc_shared::observability::metrics::{
        record_consumable_cache_load, record_shop_transaction,
    };

    #[test]
    fn test_shop_transaction_counter_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_shop_transaction("buy", "ok");
            record_shop_transaction("buy", "ok");
            record_shop_transaction("recharge", "NOT_ENOUGH_MONEY_2");
        });

        let rendered = handle.render();
        assert!(rendered.contains("npc_shop_transactions_total"));
        assert!(rendered.contains(r#"operation="buy""#));
        assert!(rendered.contains(r#"outcome="NOT_ENOUGH_MONEY_2""#));
    }

    #[test]
    fn test_consumable_cache_load_counter() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_consumable_cache_load(true);
            record_consumable_cache_load(false);
        });

        let rendered = handle.render();
        assert!(rendered.contains("npc_shop_consumable_cache_loads_total"));
        assert!(rendered.contains(r#"result="ok""#));
        assert!(rendered.contains(r#"result="error""#));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_shop_transaction("exit", "ok");
        record_consumable_cache_load(true);
    }
}

mod tracing_tests {
    use npc_shared::config::ObservabilityConfig;
    use npc_shared::observability::tracing::env_filter;

    #[test]
    fn test_env_filter_uses_configured_level() {
        let config = ObservabilityConfig {
            log_level: "npc_shop_service=debug,info".to_string(),
            ..Default::default()
        };
        let filter = env_filter(&config);
        // RUST_LOG 未设置时应采用配置的级别
        if std::env::var("RUST_LOG").is_err() {
            assert!(filter.to_string().contains("npc_shop_service=debug"));
        }
    }

    #[test]
    fn test_json_format_detection() {
        let mut config = ObservabilityConfig::default();
        assert!(!config.json_logs());
        config.log_format = "JSON".to_string();
        assert!(config.json_logs());
    }
}

mod guard_tests {
    use npc_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard_drops_cleanly() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}
