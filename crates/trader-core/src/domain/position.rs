//! 선물 포지션.
//!
//! 단방향(one-way) 모드를 전제로 심볼당 하나의 순포지션만 존재합니다.

use crate::domain::Side;
use crate::types::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 거래소가 보고한 심볼의 순포지션.
///
/// `amount`는 부호가 있는 수량입니다 (양수 = 롱, 음수 = 숏, 0 = 무포지션).
/// 조정 시마다 새로 조회하며 호출 간에 캐시하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesPosition {
    /// 거래 심볼
    pub symbol: String,
    /// 부호 있는 포지션 수량
    pub amount: Quantity,
    /// 현재 설정된 레버리지
    pub leverage: u32,
    /// 평균 진입 가격
    #[serde(default)]
    pub entry_price: Price,
}

impl FuturesPosition {
    /// 새 포지션을 생성합니다.
    pub fn new(symbol: impl Into<String>, amount: Quantity, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            amount,
            leverage,
            entry_price: Decimal::ZERO,
        }
    }

    /// 진입 가격을 설정합니다.
    pub fn with_entry_price(mut self, entry_price: Price) -> Self {
        self.entry_price = entry_price;
        self
    }

    /// 포지션이 없는지 확인합니다.
    pub fn is_flat(&self) -> bool {
        self.amount.is_zero()
    }

    /// 포지션 방향 (롱 = Buy, 숏 = Sell).
    pub fn side(&self) -> Option<Side> {
        Side::for_amount(self.amount)
    }

    /// 포지션 수량의 절대값.
    pub fn abs_amount(&self) -> Quantity {
        self.amount.abs()
    }

    /// 전량 청산에 필요한 주문 방향.
    pub fn close_side(&self) -> Option<Side> {
        self.side().map(|side| side.opposite())
    }
}
