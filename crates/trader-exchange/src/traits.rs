//! 선물 거래소 trait 정의.

use async_trait::async_trait;
use rust_decimal::Decimal;
use trader_core::{FuturesPosition, MarketOrderRequest, OrderRef, OrderResult, Price, SymbolPrecision};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 단일 USDT-M 선물 계좌에 대한 원격 호출 인터페이스.
///
/// 구현체는 재시도를 하지 않습니다. 재시도는 `ExchangeGateway`가 담당합니다.
#[async_trait]
pub trait FuturesExchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    // === 계좌 ===

    /// 심볼의 순포지션 조회. 거래소에 기록이 없으면 `None`.
    async fn position_information(&self, symbol: &str) -> ExchangeResult<Option<FuturesPosition>>;

    /// 자산의 주문 가능 잔고 조회. 자산이 없으면 0.
    async fn available_balance(&self, asset: &str) -> ExchangeResult<Decimal>;

    // === 시장 데이터 ===

    /// 심볼의 최신 체결가 조회.
    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<Price>;

    /// 거래소 전체 심볼의 수량 정밀도 조회.
    async fn exchange_symbols(&self) -> ExchangeResult<Vec<SymbolPrecision>>;

    // === 주문 ===

    /// 심볼 레버리지 변경. 적용된 레버리지를 반환합니다.
    async fn change_leverage(&self, symbol: &str, leverage: u32) -> ExchangeResult<u32>;

    /// 시장가 주문 제출. 거래소 주문 ID를 반환합니다.
    async fn place_market_order(&self, request: &MarketOrderRequest) -> ExchangeResult<String>;

    /// 주문 조회.
    async fn get_order(&self, symbol: &str, order: &OrderRef) -> ExchangeResult<OrderResult>;
}
