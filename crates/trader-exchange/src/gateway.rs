//! 거래소 게이트웨이.
//!
//! `FuturesExchange` 구현체의 모든 호출을 동일한 `RetryPolicy`로 감쌉니다.
//! 게이트웨이는 상태를 캐시하지 않으며, 원격 호출 외의 부수 효과가 없습니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use trader_core::{FuturesPosition, MarketOrderRequest, OrderRef, OrderResult, Price, SymbolPrecision};

use crate::error::ExchangeError;
use crate::retry::RetryPolicy;
use crate::traits::{ExchangeResult, FuturesExchange};

/// 재시도 정책이 적용된 거래소 호출 계층.
#[derive(Clone)]
pub struct ExchangeGateway {
    exchange: Arc<dyn FuturesExchange>,
    retry: RetryPolicy,
    quote_asset: String,
}

impl std::fmt::Debug for ExchangeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeGateway")
            .field("exchange", &self.exchange.name())
            .field("retry", &self.retry)
            .field("quote_asset", &self.quote_asset)
            .finish()
    }
}

impl ExchangeGateway {
    /// 새 게이트웨이 생성. 증거금 자산은 USDT.
    pub fn new(exchange: Arc<dyn FuturesExchange>, retry: RetryPolicy) -> Self {
        Self {
            exchange,
            retry,
            quote_asset: "USDT".to_string(),
        }
    }

    /// 증거금 자산을 설정합니다.
    pub fn with_quote_asset(mut self, asset: impl Into<String>) -> Self {
        self.quote_asset = asset.into();
        self
    }

    /// 연결된 거래소 이름.
    pub fn exchange_name(&self) -> &str {
        self.exchange.name()
    }

    /// 적용 중인 재시도 정책.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// 심볼의 순포지션 조회. 기록이 없으면 `None`.
    pub async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<FuturesPosition>> {
        let exchange = self.exchange.as_ref();
        self.retry
            .run("get_position", move |_| exchange.position_information(symbol))
            .await
    }

    /// 증거금 자산의 주문 가능 잔고.
    pub async fn get_balance(&self) -> ExchangeResult<Decimal> {
        let exchange = self.exchange.as_ref();
        let asset = self.quote_asset.as_str();
        self.retry
            .run("get_balance", move |_| exchange.available_balance(asset))
            .await
    }

    /// 심볼의 현재 가격.
    pub async fn get_price(&self, symbol: &str) -> ExchangeResult<Price> {
        let exchange = self.exchange.as_ref();
        self.retry
            .run("get_price", move |_| exchange.ticker_price(symbol))
            .await
    }

    /// 거래소 전체 심볼의 수량 정밀도.
    pub async fn get_symbol_precisions(&self) -> ExchangeResult<Vec<SymbolPrecision>> {
        let exchange = self.exchange.as_ref();
        self.retry
            .run("get_symbol_precisions", move |_| exchange.exchange_symbols())
            .await
    }

    /// 단일 심볼의 수량 정밀도. 거래소에 없으면 `SymbolNotFound`.
    pub async fn get_symbol_precision(&self, symbol: &str) -> ExchangeResult<SymbolPrecision> {
        self.get_symbol_precisions()
            .await?
            .into_iter()
            .find(|p| p.symbol == symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    /// 레버리지 설정. 적용된 레버리지를 반환합니다.
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> ExchangeResult<u32> {
        let exchange = self.exchange.as_ref();
        self.retry
            .run("set_leverage", move |_| exchange.change_leverage(symbol, leverage))
            .await
    }

    /// 주문 조회.
    pub async fn get_order(&self, symbol: &str, order: &OrderRef) -> ExchangeResult<OrderResult> {
        let exchange = self.exchange.as_ref();
        self.retry
            .run("get_order", move |_| exchange.get_order(symbol, order))
            .await
    }

    /// 시장가 주문을 제출하고 체결 결과를 조회합니다.
    ///
    /// 재시도는 같은 클라이언트 주문 ID를 재사용합니다. 이미 체결된 주문의 ID는
    /// 거래소에서 다시 사용할 수 있으므로, 재시도 전에 항상 클라이언트 주문 ID로
    /// 기존 주문을 조회하고 `OrderNotFound`일 때만 재제출합니다.
    pub async fn place_market_order(&self, request: &MarketOrderRequest) -> ExchangeResult<OrderResult> {
        let exchange = self.exchange.as_ref();

        let order_id = self
            .retry
            .run("place_market_order", move |attempt| async move {
                let client_id = match &request.client_order_id {
                    Some(client_id) if attempt > 0 => client_id.clone(),
                    _ => return exchange.place_market_order(request).await,
                };

                match exchange
                    .get_order(&request.symbol, &OrderRef::ClientId(client_id.clone()))
                    .await
                {
                    Ok(order) => {
                        warn!(
                            symbol = %request.symbol,
                            client_order_id = %client_id,
                            order_id = %order.order_id,
                            attempt = attempt + 1,
                            "Order was accepted by an earlier attempt, not resubmitting"
                        );
                        Ok(order.order_id)
                    }
                    Err(ExchangeError::OrderNotFound(_)) => exchange.place_market_order(request).await,
                    Err(e) => Err(e),
                }
            })
            .await?;

        let order = self.get_order(&request.symbol, &OrderRef::Id(order_id)).await?;
        info!(
            order_id = %order.order_id,
            symbol = %order.symbol,
            side = %order.side,
            executed_quantity = %order.executed_quantity,
            average_price = %order.average_price,
            "Market order filled"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{ExchangeCall, ExchangeOp, SimulatedConfig, SimulatedFuturesExchange};
    use rust_decimal_macros::dec;
    use trader_core::Side;

    fn setup() -> (Arc<SimulatedFuturesExchange>, ExchangeGateway) {
        let exchange = Arc::new(SimulatedFuturesExchange::new(
            SimulatedConfig::default()
                .with_balance("USDT", dec!(1000))
                .with_symbol("BTCUSDT", dec!(25000), 3)
                .with_position("BTCUSDT", dec!(0.5), 5),
        ));
        let gateway = ExchangeGateway::new(exchange.clone(), RetryPolicy::default());
        (exchange, gateway)
    }

    #[tokio::test]
    async fn test_reads_pass_through() {
        let (_, gateway) = setup();
        assert_eq!(gateway.get_balance().await.unwrap(), dec!(1000));
        assert_eq!(gateway.get_price("BTCUSDT").await.unwrap(), dec!(25000));
        assert_eq!(
            gateway.get_symbol_precision("BTCUSDT").await.unwrap(),
            SymbolPrecision::new("BTCUSDT", 3)
        );
        assert!(gateway.get_position("ETHUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_symbol_precision() {
        let (_, gateway) = setup();
        let err = gateway.get_symbol_precision("FOOUSDT").await.unwrap_err();
        assert_eq!(err, ExchangeError::SymbolNotFound("FOOUSDT".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_read_failure_is_retried() {
        let (exchange, gateway) = setup();
        exchange
            .fail_next(ExchangeOp::Position, ExchangeError::Disconnected("-1001".to_string()))
            .await;
        exchange.fail_next(ExchangeOp::Position, ExchangeError::RateLimited).await;

        let position = gateway.get_position("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(position.amount, dec!(0.5));
        assert_eq!(exchange.call_count(ExchangeOp::Position).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_exhausts_attempts() {
        let (exchange, gateway) = setup();
        for _ in 0..5 {
            exchange
                .fail_next(ExchangeOp::Balance, ExchangeError::NetworkError("down".to_string()))
                .await;
        }

        let err = gateway.get_balance().await.unwrap_err();
        assert!(matches!(err, ExchangeError::NetworkError(_)));
        assert_eq!(exchange.call_count(ExchangeOp::Balance).await, 5);
    }

    #[tokio::test]
    async fn test_business_rejection_is_not_retried() {
        let (exchange, gateway) = setup();
        exchange
            .fail_next(ExchangeOp::ChangeLeverage, ExchangeError::Unauthorized("-2015".to_string()))
            .await;

        assert!(gateway.set_leverage("BTCUSDT", 3).await.is_err());
        assert_eq!(exchange.call_count(ExchangeOp::ChangeLeverage).await, 1);
    }

    #[tokio::test]
    async fn test_place_order_returns_fill() {
        let (_, gateway) = setup();
        let request = MarketOrderRequest::close("BTCUSDT", Side::Sell, dec!(0.5)).with_client_id("c-1");
        let order = gateway.place_market_order(&request).await.unwrap();

        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.executed_quantity, dec!(0.5));
        assert_eq!(order.average_price, dec!(25000));
        assert_eq!(order.client_order_id.as_deref(), Some("c-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_response_does_not_duplicate_order() {
        let (exchange, gateway) = setup();
        exchange
            .fail_next_after_execution(
                ExchangeOp::PlaceOrder,
                ExchangeError::Timeout("response lost".to_string()),
            )
            .await;

        let request = MarketOrderRequest::close("BTCUSDT", Side::Sell, dec!(0.5)).with_client_id("c-2");
        let order = gateway.place_market_order(&request).await.unwrap();

        assert_eq!(order.client_order_id.as_deref(), Some("c-2"));
        assert_eq!(exchange.call_count(ExchangeOp::PlaceOrder).await, 1);
        assert_eq!(exchange.calls().await, vec![ExchangeCall::PlaceOrder(request)]);
        assert!(exchange.position("BTCUSDT").await.unwrap().is_flat());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_open_response_does_not_double_position() {
        let (exchange, gateway) = setup();
        exchange
            .fail_next_after_execution(
                ExchangeOp::PlaceOrder,
                ExchangeError::Timeout("-1007".to_string()),
            )
            .await;

        // 체결된 주문의 ID는 재사용 가능하므로 재제출했다면 0.2가 되었을 것
        let request = MarketOrderRequest::open("BTCUSDT", Side::Sell, dec!(0.1)).with_client_id("o-3");
        let order = gateway.place_market_order(&request).await.unwrap();

        assert_eq!(order.executed_quantity, dec!(0.1));
        assert_eq!(exchange.call_count(ExchangeOp::PlaceOrder).await, 1);
        assert_eq!(exchange.position("BTCUSDT").await.unwrap().amount, dec!(0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_rejected_before_execution_is_resubmitted() {
        let (exchange, gateway) = setup();
        exchange
            .fail_next(ExchangeOp::PlaceOrder, ExchangeError::NetworkError("reset".to_string()))
            .await;

        let request = MarketOrderRequest::close("BTCUSDT", Side::Sell, dec!(0.5)).with_client_id("c-4");
        let order = gateway.place_market_order(&request).await.unwrap();

        assert_eq!(order.client_order_id.as_deref(), Some("c-4"));
        assert_eq!(exchange.call_count(ExchangeOp::PlaceOrder).await, 2);
        // 재제출 전 조회 1회 + 체결 조회 1회
        assert_eq!(exchange.call_count(ExchangeOp::GetOrder).await, 2);
        assert_eq!(exchange.calls().await, vec![ExchangeCall::PlaceOrder(request)]);
    }

    #[tokio::test]
    async fn test_binance_retry_looks_up_order_before_resubmitting() {
        use crate::connector::{BinanceFuturesClient, BinanceFuturesConfig};
        use mockito::{Matcher, Server};
        use std::time::Duration;

        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/fapi/v1/order")
            .with_status(503)
            .with_body(r#"{"code":-1007,"msg":"Timeout waiting for response from backend server."}"#)
            .expect(1)
            .create_async()
            .await;
        let lookup = server
            .mock("GET", "/fapi/v1/order")
            .match_query(Matcher::UrlEncoded("origClientOrderId".into(), "o-5".into()))
            .with_status(200)
            .with_body(
                r#"{"symbol":"BTCUSDT","orderId":42,"clientOrderId":"o-5","avgPrice":"25000","executedQty":"0.010","status":"FILLED","side":"BUY"}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let readback = server
            .mock("GET", "/fapi/v1/order")
            .match_query(Matcher::UrlEncoded("orderId".into(), "42".into()))
            .with_status(200)
            .with_body(
                r#"{"symbol":"BTCUSDT","orderId":42,"clientOrderId":"o-5","avgPrice":"25000","executedQty":"0.010","status":"FILLED","side":"BUY"}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let config = BinanceFuturesConfig::new("test-api-key-1234", "test-secret").with_base_url(server.url());
        let client = Arc::new(BinanceFuturesClient::new(config).unwrap());
        let gateway = ExchangeGateway::new(client, RetryPolicy::new(3, Duration::from_millis(1)));

        let request = MarketOrderRequest::open("BTCUSDT", Side::Buy, dec!(0.010)).with_client_id("o-5");
        let order = gateway.place_market_order(&request).await.unwrap();

        assert_eq!(order.order_id, "42");
        assert_eq!(order.executed_quantity, dec!(0.010));
        submit.assert_async().await;
        lookup.assert_async().await;
        readback.assert_async().await;
    }
}
