//! 可观测性模块集成测试
//!
//! 未安装 recorder 时指标记录函数应为空操作，日志初始化可重复调用。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use rental_shared::observability::metrics::{
        record_dead_letter, record_event_consumed, record_event_published, record_rental_return,
        record_retry_attempt,
    };

    #[test]
    fn test_record_rental_return() {
        record_rental_return("early");
        record_rental_return("on_time");
        record_rental_return("late");
    }

    #[test]
    fn test_record_event_lifecycle() {
        record_event_published("MotorcycleCreatedEvent");
        record_event_consumed("persisted", 0.012);
        record_event_consumed("filtered", 0.001);
        record_event_consumed("dead_lettered", 3.2);
        record_dead_letter("motorcycle.failed");
    }

    #[test]
    fn test_record_retry_attempt() {
        record_retry_attempt("motorcycle.publish");
        record_retry_attempt("rental.return");
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use rental_shared::observability::ObservabilityConfig;

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: ObservabilityConfig =
            serde_json::from_str(r#"{"json_logs": true, "metrics_port": 9191}"#).unwrap();

        assert!(config.json_logs);
        assert_eq!(config.metrics_port, 9191);
        assert_eq!(config.log_level, "info");
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_service_name_override() {
        let config = ObservabilityConfig::default().with_service_name("motorcycle-event-consumer");
        assert_eq!(config.service_name, "motorcycle-event-consumer");
    }
}

// ============================================================================
// 日志初始化测试
// ============================================================================

mod tracing_tests {
    use rental_shared::observability::tracing::init_for_tests;

    #[test]
    fn test_init_for_tests_twice() {
        init_for_tests();
        init_for_tests();
        tracing::info!(rental_id = "r-1", "日志初始化后可正常输出");
    }
}
