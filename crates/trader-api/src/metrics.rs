//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 조정/주문 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.
//! 거래소 재시도 횟수(`exchange_retries_total`)는 `trader-exchange`의 재시도 정책이 기록합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use trader_core::OrderResult;
use trader_execution::ReconcileReport;

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        // 재시도 백오프 포함 (1 + 2 + 4 + 8초)
        .set_buckets_for_metric(
            Matcher::Full("reconcile_duration_seconds".to_string()),
            &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 조정 메트릭 헬퍼 함수
// ============================================================================

/// 조정 결과 카운터 증가. `outcome`은 성공 시 조정 유형, 실패 시 에러 분류.
pub fn record_reconcile(source: &str, outcome: &str) {
    counter!(
        "reconciliations_total",
        "source" => source.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 조정 소요 시간 기록.
pub fn record_reconcile_duration(source: &str, duration_secs: f64) {
    histogram!("reconcile_duration_seconds", "source" => source.to_string()).record(duration_secs);
}

/// 체결 주문 카운터 증가.
pub fn record_order(order: &OrderResult, exchange: &str) {
    counter!(
        "trading_orders_total",
        "side" => order.side.as_str(),
        "status" => format!("{:?}", order.status).to_lowercase(),
        "exchange" => exchange.to_string()
    )
    .increment(1);
}

/// 조정 결과의 주문을 모두 기록합니다.
pub fn record_report_orders(report: &ReconcileReport, exchange: &str) {
    for order in report.close_order.iter().chain(report.open_order.iter()) {
        record_order(order, exchange);
    }
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/orders/123e4567-e89b-12d3-a456-426614174000` → `/orders/:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());

            if is_uuid || is_numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
