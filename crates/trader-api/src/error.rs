//! API 에러 응답 타입.
//!
//! 모든 엔드포인트에서 일관된 에러 형식 `{code, message, details?}`를 제공하고,
//! 도메인 에러를 HTTP 상태 코드로 변환합니다.
//!
//! | 에러 | 상태 코드 |
//! |---|---|
//! | 요청 검증 실패, 시그널 파싱 실패 | 400 |
//! | 알 수 없는 심볼, 거래소 업무 거부 | 400 |
//! | 일시적 장애 재시도 소진, 잘못된 시세 | 502 |
//! | 조정 시간 초과 | 504 |

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trader_core::SignalError;
use trader_execution::ReconcileError;
use validator::ValidationErrors;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "EXCHANGE_REJECTED",
///   "message": "Exchange rejected open_position: Insufficient balance: ...",
///   "details": {"step": "open_position", "kind": "insufficient_balance"},
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "EXCHANGE_REJECTED")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 에러 코드 반환.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 에러 메시지 반환.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

/// 요청 본문 검증 실패.
pub fn validation_error(errors: &ValidationErrors) -> (StatusCode, Json<ApiErrorResponse>) {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: invalid value", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::new("VALIDATION_ERROR", message)),
    )
}

/// 시그널 생성/파싱 실패. 재시도 대상이 아닌 클라이언트 입력 오류입니다.
pub fn signal_error(err: &SignalError) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::new("INVALID_SIGNAL", err.to_string())),
    )
}

/// 조정 실패를 상태 코드와 에러 본문으로 변환합니다.
pub fn reconcile_error(err: &ReconcileError) -> (StatusCode, Json<ApiErrorResponse>) {
    let (status, code, details) = match err {
        ReconcileError::ExchangeRejection { step, source } => (
            StatusCode::BAD_REQUEST,
            "EXCHANGE_REJECTED",
            Some(json!({ "step": step, "kind": source.kind() })),
        ),
        ReconcileError::TransientExhausted { step, source } => (
            StatusCode::BAD_GATEWAY,
            "EXCHANGE_UNAVAILABLE",
            Some(json!({ "step": step, "kind": source.kind() })),
        ),
        ReconcileError::UnknownSymbol(symbol) => (
            StatusCode::BAD_REQUEST,
            "UNKNOWN_SYMBOL",
            Some(json!({ "symbol": symbol })),
        ),
        ReconcileError::InvalidPrice { symbol, price } => (
            StatusCode::BAD_GATEWAY,
            "INVALID_PRICE",
            Some(json!({ "symbol": symbol, "price": price })),
        ),
        ReconcileError::Timeout(timeout) => (
            StatusCode::GATEWAY_TIMEOUT,
            "RECONCILE_TIMEOUT",
            Some(json!({ "timeout_secs": timeout.as_secs() })),
        ),
    };

    let body = match details {
        Some(details) => ApiErrorResponse::with_details(code, err.to_string(), details),
        None => ApiErrorResponse::new(code, err.to_string()),
    };
    (status, Json(body))
}

/// 예상하지 못한 내부 오류.
pub fn internal_error(message: impl Into<String>) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiErrorResponse::new("INTERNAL_ERROR", message)),
    )
}
