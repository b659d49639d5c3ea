//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// readiness 확인에 사용하는 심볼.
pub const READINESS_PROBE_SYMBOL: &str = "BTCUSDT";

/// readiness 거래소 확인 제한 시간.
const READINESS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "unhealthy")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 개별 컴포넌트 상태
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// 거래소 연결 상태
    pub exchange: ComponentStatus,

    /// 조정기 설정
    pub reconciler: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down")
    pub status: String,

    /// 추가 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    /// 비정상 상태.
    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    /// 정보 포함 정상 상태.
    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크 (readiness probe용).
///
/// 거래소에 시세 조회를 보내 응답 여부를 확인합니다.
/// GET /health/ready
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let gateway = state.reconciler.gateway();

    let exchange_status =
        match tokio::time::timeout(READINESS_PROBE_TIMEOUT, gateway.get_price(READINESS_PROBE_SYMBOL)).await {
            Ok(Ok(price)) => ComponentStatus::up_with_info(format!(
                "{}: {} price {}",
                state.exchange_name(),
                READINESS_PROBE_SYMBOL,
                price
            )),
            Ok(Err(e)) => ComponentStatus::down(format!("{}: {}", state.exchange_name(), e)),
            Err(_) => ComponentStatus::down(format!("{}: probe timed out", state.exchange_name())),
        };

    let reconciler_status = ComponentStatus::up_with_info(format!(
        "leverage {}, max attempts {}, timeout {}s",
        state.reconciler.desired_leverage(),
        gateway.retry_policy().max_attempts,
        state.reconcile_timeout.as_secs()
    ));

    let (overall_status, status_code) = if exchange_status.is_up() {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            exchange: exchange_status,
            reconciler: reconciler_status,
        },
    };

    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
