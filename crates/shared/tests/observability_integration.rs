//! 可观测性模块集成测试
//!
//! 覆盖订单管道指标的导出格式和 Kafka 消息头中的追踪上下文传播。

use std::collections::HashMap;

// ============================================================================
// 指标导出测试
// ============================================================================

mod metrics_tests {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use order_shared::observability::metrics::{
        record_dead_letter, record_http_request, record_order_processed, set_persisted_orders,
    };

    /// 在局部 recorder 下执行并返回 Prometheus 文本格式的输出
    fn render(record: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, record);
        handle.render()
    }

    /// 取出指定序列（名称加标签）的样本值
    fn sample(output: &str, series: &str) -> Option<f64> {
        output
            .lines()
            .find(|line| line.starts_with(series) && line[series.len()..].starts_with(' '))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn test_order_outcomes_are_counted_by_status() {
        let output = render(|| {
            record_order_processed("acknowledged", 0.01);
            record_order_processed("acknowledged", 0.02);
            record_order_processed("dead_lettered", 0.03);
        });

        assert_eq!(
            sample(&output, r#"orders_processed_total{status="acknowledged"}"#),
            Some(2.0)
        );
        assert_eq!(
            sample(&output, r#"orders_processed_total{status="dead_lettered"}"#),
            Some(1.0)
        );
        assert!(output.contains("order_processing_duration_seconds"));
    }

    #[test]
    fn test_dead_letters_are_counted_by_reason() {
        let output = render(|| {
            record_dead_letter("decode");
            record_dead_letter("validation");
            record_dead_letter("validation");
        });

        assert_eq!(
            sample(&output, r#"orders_dead_lettered_total{reason="decode"}"#),
            Some(1.0)
        );
        assert_eq!(
            sample(&output, r#"orders_dead_lettered_total{reason="validation"}"#),
            Some(2.0)
        );
    }

    #[test]
    fn test_persisted_gauge_keeps_latest_value() {
        let output = render(|| {
            set_persisted_orders(3);
            set_persisted_orders(5);
        });

        assert_eq!(sample(&output, "orders_persisted_count"), Some(5.0));
    }

    #[test]
    fn test_http_request_labels() {
        let output = render(|| {
            record_http_request("GET", "/order", 200, 0.004);
            record_http_request("GET", "/order", 500, 0.002);
        });

        let request_lines: Vec<_> = output
            .lines()
            .filter(|line| line.starts_with("http_requests_total{"))
            .collect();
        assert_eq!(request_lines.len(), 2);
        assert!(request_lines.iter().all(|line| line.contains(r#"path="/order""#)));
        assert!(request_lines.iter().any(|line| line.contains(r#"status="500""#)));
    }
}

// ============================================================================
// 追踪上下文传播测试
// ============================================================================

mod tracing_tests {
    use super::*;
    use opentelemetry::trace::TraceContextExt;
    use order_shared::observability::tracing::{
        current_trace_id, extract_from_headers, inject_to_headers, set_parent_from_headers,
    };

    const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

    #[test]
    fn test_extract_from_message_headers() {
        let mut headers = HashMap::new();
        headers.insert("traceparent".to_string(), TRACEPARENT.to_string());
        headers.insert("x-dlq-retry-count".to_string(), "1".to_string());

        let context = extract_from_headers(&headers);
        let span_context = context.span().span_context().clone();

        assert!(span_context.is_valid());
        assert_eq!(
            span_context.trace_id().to_string(),
            "0af7651916cd43dd8448eb211c80319c"
        );
        assert_eq!(span_context.span_id().to_string(), "b7ad6b7169203331");
    }

    #[test]
    fn test_malformed_traceparent_is_ignored() {
        let cases = [
            "",
            "00",
            "00-0af7651916cd43dd8448eb211c80319c",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331",
            "00-invalid-b7ad6b7169203331-01",
        ];

        for invalid in cases {
            let mut headers = HashMap::new();
            headers.insert("traceparent".to_string(), invalid.to_string());
            let context = extract_from_headers(&headers);
            assert!(!context.span().span_context().is_valid(), "{invalid}");
        }
    }

    #[test]
    fn test_inject_without_active_span() {
        let mut headers = HashMap::new();
        headers.insert("x-dlq-retry-count".to_string(), "2".to_string());

        inject_to_headers(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(current_trace_id().is_none());
    }

    #[test]
    fn test_set_parent_on_worker_span() {
        let mut headers = HashMap::new();
        headers.insert("traceparent".to_string(), TRACEPARENT.to_string());

        let span = tracing::info_span!("process_order_message");
        set_parent_from_headers(&span, &headers);
    }
}

// ============================================================================
// 可观测性配置测试
// ============================================================================

mod config_tests {
    use order_shared::config::ObservabilityConfig;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(config.metrics_enabled);
        assert!(config.tracing_endpoint.is_none());
        assert!(!config.json_logs());
    }
}
