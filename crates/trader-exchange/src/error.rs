//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 관련 에러.
///
/// `is_retryable()`이 참인 에러만 일시적 장애로 간주되어 재시도됩니다.
/// 나머지는 거래소의 업무 거부로 첫 발생 시 그대로 반환됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 거래소 연결 끊김 (-1001)
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과 (-1003, HTTP 429/418)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 거래소 서버 에러 (HTTP 5xx)
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// 타임스탬프 동기화 에러 (-1021)
    #[error("Timestamp error: {0}")]
    TimestampError(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 유효하지 않은 수량
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// 증거금 부족
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 이미 사용된 클라이언트 주문 ID (-4116)
    #[error("Duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 일시적 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::RateLimited
                | ExchangeError::ServerError { .. }
                | ExchangeError::TimestampError(_)
        )
    }

    /// 메트릭/로그용 짧은 분류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::NetworkError(_) => "network",
            ExchangeError::Disconnected(_) => "disconnected",
            ExchangeError::Timeout(_) => "timeout",
            ExchangeError::RateLimited => "rate_limited",
            ExchangeError::ServerError { .. } => "server_error",
            ExchangeError::TimestampError(_) => "timestamp",
            ExchangeError::Unauthorized(_) => "unauthorized",
            ExchangeError::ApiError { .. } => "api_error",
            ExchangeError::ParseError(_) => "parse_error",
            ExchangeError::InvalidQuantity(_) => "invalid_quantity",
            ExchangeError::InsufficientBalance(_) => "insufficient_balance",
            ExchangeError::OrderNotFound(_) => "order_not_found",
            ExchangeError::SymbolNotFound(_) => "symbol_not_found",
            ExchangeError::OrderRejected(_) => "order_rejected",
            ExchangeError::DuplicateClientOrderId(_) => "duplicate_client_order_id",
            ExchangeError::Unknown(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(ExchangeError::NetworkError("reset".into()).is_retryable());
        assert!(ExchangeError::Disconnected("-1001".into()).is_retryable());
        assert!(ExchangeError::Timeout("30s".into()).is_retryable());
        assert!(ExchangeError::RateLimited.is_retryable());
        assert!(ExchangeError::TimestampError("drift".into()).is_retryable());
        assert!(ExchangeError::ServerError {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_business_rejections_are_not_retryable() {
        assert!(!ExchangeError::InvalidQuantity("-1111".into()).is_retryable());
        assert!(!ExchangeError::InsufficientBalance("-2019".into()).is_retryable());
        assert!(!ExchangeError::SymbolNotFound("FOO".into()).is_retryable());
        assert!(!ExchangeError::Unauthorized("-2015".into()).is_retryable());
        assert!(!ExchangeError::ParseError("bad".into()).is_retryable());
        assert!(!ExchangeError::ApiError {
            code: -4000,
            message: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_json_error_conversion() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(ExchangeError::from(err), ExchangeError::ParseError(_)));
    }
}
