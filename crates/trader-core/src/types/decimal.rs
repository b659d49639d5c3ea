//! 정밀한 금융 계산을 위한 Decimal 유틸리티.
//!
//! 수량은 거래소가 허용하는 자릿수 이상으로 절대 올림되지 않아야 하므로
//! 절사(0 방향) 연산을 별도로 제공합니다.

use rust_decimal::{Decimal, RoundingStrategy};

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Quantity = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 지정된 소수점 자릿수에서 0 방향으로 절사합니다.
    fn truncate_dp(&self, dp: u32) -> Decimal;

    /// 두 값이 0이 아니면서 부호가 같은지 확인합니다.
    fn same_sign(&self, other: &Decimal) -> bool;
}

impl DecimalExt for Decimal {
    fn truncate_dp(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
    }

    fn same_sign(&self, other: &Decimal) -> bool {
        if self.is_zero() || other.is_zero() {
            return false;
        }
        self.is_sign_positive() == other.is_sign_positive()
    }
}
