//! 심볼별 수량 정밀도.

use serde::{Deserialize, Serialize};

/// 거래소가 허용하는 주문 수량의 소수점 자릿수.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPrecision {
    /// 거래 심볼
    pub symbol: String,
    /// 수량 소수점 자릿수
    pub quantity_precision: u32,
}

impl SymbolPrecision {
    /// 새 정밀도 정보를 생성합니다.
    pub fn new(symbol: impl Into<String>, quantity_precision: u32) -> Self {
        Self {
            symbol: symbol.into(),
            quantity_precision,
        }
    }
}
