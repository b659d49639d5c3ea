//! 시그널 수신 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /trade` - 구조화된 JSON 시그널
//! - `POST /webhook` - 알림 서비스의 텍스트 메시지
//!
//! 두 엔드포인트 모두 같은 조정 경로로 위임합니다.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use trader_core::{OrderResult, Side, TradingSignal};
use trader_execution::{ReconcileAction, ReconcileReport};
use validator::Validate;

use crate::error::{
    internal_error, reconcile_error, signal_error, validation_error, ApiErrorResponse, ApiResult,
};
use crate::metrics::{record_reconcile, record_reconcile_duration, record_report_orders};
use crate::state::AppState;

const SOURCE_TRADE: &str = "trade";
const SOURCE_WEBHOOK: &str = "webhook";

/// 구조화된 거래 시그널 요청.
///
/// `position_size`의 부호가 목표 방향을 결정하며, `direction`은 참고용입니다.
#[derive(Debug, Deserialize, Validate)]
pub struct TradeRequest {
    /// 거래 심볼 (예: "BTCUSDT")
    #[validate(length(min = 1, max = 20, message = "symbol must be 1-20 characters"))]
    pub symbol: String,
    /// 시그널 방향 (BUY | SELL)
    pub direction: Side,
    /// 테스트 시그널 여부
    #[serde(default, alias = "isTest")]
    pub is_test: bool,
    /// 부호 있는 목표 순포지션
    #[serde(alias = "positionSize")]
    pub position_size: Decimal,
}

/// 조정 결과 응답.
#[derive(Debug, Serialize)]
pub struct TradeResponse {
    /// 결과 메시지
    pub message: String,
    /// 조정 ID (로그의 `reconcile_id`와 동일)
    pub reconcile_id: String,
    /// 실행된 작업
    pub action: ReconcileAction,
    /// 대표 주문 (진입 주문, 없으면 청산 주문)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderResult>,
}

impl From<&ReconcileReport> for TradeResponse {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            message: report.summary_message(),
            reconcile_id: report.reconcile_id.to_string(),
            action: report.action,
            order: report.primary_order().cloned(),
        }
    }
}

/// 구조화된 시그널 처리.
///
/// POST /trade
pub async fn trade(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<Json<TradeResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::new("VALIDATION_ERROR", rejection.body_text())),
        )
    })?;

    if let Err(errors) = request.validate() {
        return Err(validation_error(&errors));
    }

    let signal = TradingSignal::new(&request.symbol, request.position_size, request.is_test)
        .map_err(|e| signal_error(&e))?;

    if let Some(target_side) = signal.target_side() {
        if target_side != request.direction {
            warn!(
                symbol = %signal.symbol,
                direction = %request.direction,
                position_size = %signal.target_position_size,
                "Signal direction disagrees with position size sign, following position size"
            );
        }
    }

    execute_signal(state, signal, SOURCE_TRADE).await.map(Json)
}

/// 웹훅 텍스트 시그널 처리.
///
/// POST /webhook
pub async fn webhook(State(state): State<Arc<AppState>>, body: String) -> ApiResult<Json<TradeResponse>> {
    let signal = TradingSignal::from_webhook_text(&body).map_err(|e| {
        warn!(error = %e, text = %body, "Rejected webhook message");
        signal_error(&e)
    })?;

    execute_signal(state, signal, SOURCE_WEBHOOK).await.map(Json)
}

/// 조정을 별도 태스크에서 실행합니다.
///
/// 클라이언트 연결이 끊겨도 진행 중인 조정은 중간에 취소되지 않습니다.
async fn execute_signal(
    state: Arc<AppState>,
    signal: TradingSignal,
    source: &'static str,
) -> ApiResult<TradeResponse> {
    info!(
        source,
        symbol = %signal.symbol,
        target_position_size = %signal.target_position_size,
        is_test = signal.is_test,
        "Signal received"
    );

    let start = Instant::now();
    let task_state = state.clone();
    let result = tokio::spawn(async move {
        task_state
            .reconciler
            .reconcile_with_timeout(&signal, task_state.reconcile_timeout)
            .await
    })
    .await
    .map_err(|e| {
        error!(source, error = %e, "Reconciliation task failed");
        record_reconcile(source, "internal");
        internal_error(format!("reconciliation task failed: {}", e))
    })?;

    record_reconcile_duration(source, start.elapsed().as_secs_f64());

    match result {
        Ok(report) => {
            record_reconcile(source, report.action.as_str());
            record_report_orders(&report, state.exchange_name());
            Ok(TradeResponse::from(&report))
        }
        Err(e) => {
            record_reconcile(source, e.kind());
            Err(reconcile_error(&e))
        }
    }
}

/// 시그널 라우터 생성.
pub fn trade_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trade", post(trade))
        .route("/webhook", post(webhook))
}
