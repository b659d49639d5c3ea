//! 주문 타입.
//!
//! 이 모듈은 선물 시장가 주문에 필요한 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderStatusType` - 거래소 주문 상태
//! - `MarketOrderRequest` - 시장가 주문 요청
//! - `OrderRef` - 주문 조회 키
//! - `OrderResult` - 체결 결과 요약

use crate::error::TraderError;
use crate::types::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 부호 있는 수량의 방향. 0이면 `None`.
    pub fn for_amount(amount: Decimal) -> Option<Self> {
        if amount > Decimal::ZERO {
            Some(Side::Buy)
        } else if amount < Decimal::ZERO {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// 거래소 API 표기.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(TraderError::InvalidInput(format!("unknown order side: {}", other))),
        }
    }
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// 거래소에 접수됨 (미체결)
    New,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Cancelled,
    /// 거래소에서 거부됨
    Rejected,
    /// 유효 기간 만료
    Expired,
}

impl OrderStatusType {
    /// 거래소 상태 문자열을 변환합니다.
    pub fn from_exchange_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(OrderStatusType::New),
            "PARTIALLY_FILLED" => Some(OrderStatusType::PartiallyFilled),
            "FILLED" => Some(OrderStatusType::Filled),
            "CANCELED" | "CANCELLED" => Some(OrderStatusType::Cancelled),
            "REJECTED" => Some(OrderStatusType::Rejected),
            "EXPIRED" | "EXPIRED_IN_MATCH" => Some(OrderStatusType::Expired),
            _ => None,
        }
    }

    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatusType::Filled
                | OrderStatusType::Cancelled
                | OrderStatusType::Rejected
                | OrderStatusType::Expired
        )
    }
}

/// 시장가 주문 요청.
///
/// `client_order_id`는 재시도 간에 동일하게 유지되어야 중복 체결을 막을 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    /// 거래 심볼 (예: BTCUSDT)
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 수량 (항상 양수)
    pub quantity: Quantity,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// 포지션 축소 전용 여부 (청산 주문)
    #[serde(default)]
    pub reduce_only: bool,
}

impl MarketOrderRequest {
    /// 신규 진입 주문을 생성합니다.
    pub fn open(symbol: impl Into<String>, side: Side, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            client_order_id: None,
            reduce_only: false,
        }
    }

    /// 청산 주문을 생성합니다.
    pub fn close(symbol: impl Into<String>, side: Side, quantity: Quantity) -> Self {
        Self {
            reduce_only: true,
            ..Self::open(symbol, side, quantity)
        }
    }

    /// 클라이언트 주문 ID를 설정합니다.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_id.into());
        self
    }
}

/// 주문 조회 키.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    /// 거래소 주문 ID
    Id(String),
    /// 클라이언트 주문 ID
    ClientId(String),
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderRef::Id(id) => write!(f, "orderId={}", id),
            OrderRef::ClientId(id) => write!(f, "clientOrderId={}", id),
        }
    }
}

/// 체결된 주문의 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderResult {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// 거래 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 체결 수량
    pub executed_quantity: Quantity,
    /// 평균 체결 가격 (없으면 주문 가격)
    pub average_price: Price,
    /// 주문에 적용된 레버리지. 알 수 없으면 "N/A"로 직렬화됩니다.
    #[serde(serialize_with = "serialize_leverage")]
    pub leverage: Option<u32>,
}

impl OrderResult {
    /// 레버리지 정보를 설정합니다.
    pub fn with_leverage(mut self, leverage: u32) -> Self {
        self.leverage = Some(leverage);
        self
    }
}

fn serialize_leverage<S: Serializer>(leverage: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match leverage {
        Some(value) => serializer.serialize_u32(*value),
        None => serializer.serialize_str("N/A"),
    }
}
