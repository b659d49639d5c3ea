//! 주문 수량 계산.
//!
//! 가용 잔고 전액을 현재 가격으로 나눈 뒤, 거래소의 수량 정밀도에서 0 방향으로 절사합니다.
//! 결과가 0이면 "진입 불가(잔고 부족)"를 의미하며 에러가 아닙니다.

use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use trader_core::{DecimalExt, Price, Quantity, SymbolPrecision};

/// 수량 계산 오류.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: Price },
}

/// 심볼별 수량 정밀도 기반 수량 계산기.
#[derive(Debug, Clone, Default)]
pub struct QuantitySizer {
    precisions: HashMap<String, u32>,
}

impl QuantitySizer {
    /// 빈 계산기 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 정밀도 목록으로 계산기 생성.
    pub fn from_precisions(precisions: impl IntoIterator<Item = SymbolPrecision>) -> Self {
        let mut sizer = Self::new();
        for precision in precisions {
            sizer.register(precision);
        }
        sizer
    }

    /// 심볼 정밀도 등록.
    pub fn register(&mut self, precision: SymbolPrecision) {
        self.precisions.insert(precision.symbol, precision.quantity_precision);
    }

    /// 등록된 정밀도.
    pub fn precision(&self, symbol: &str) -> Option<u32> {
        self.precisions.get(symbol).copied()
    }

    /// 가용 잔고로 진입 가능한 최대 수량.
    ///
    /// 음수 잔고는 0으로 계산합니다. 절대 올림하지 않습니다.
    pub fn compute_quantity(
        &self,
        symbol: &str,
        available_balance: Decimal,
        current_price: Price,
    ) -> Result<Quantity, SizingError> {
        let precision = self
            .precision(symbol)
            .ok_or_else(|| SizingError::UnknownSymbol(symbol.to_string()))?;

        if current_price <= Decimal::ZERO {
            return Err(SizingError::InvalidPrice {
                symbol: symbol.to_string(),
                price: current_price,
            });
        }

        if available_balance <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        let raw = available_balance
            .checked_div(current_price)
            .ok_or_else(|| SizingError::InvalidPrice {
                symbol: symbol.to_string(),
                price: current_price,
            })?;

        Ok(raw.truncate_dp(precision))
    }
}
