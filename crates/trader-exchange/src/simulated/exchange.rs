//! 시뮬레이션 선물 거래소 구현.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use trader_core::{
    FuturesPosition, MarketOrderRequest, OrderRef, OrderResult, OrderStatusType, Price, Side,
    SymbolPrecision,
};

use crate::traits::{ExchangeResult, FuturesExchange};
use crate::ExchangeError;

/// 거래소 작업 종류 (호출 횟수 집계 및 장애 주입 키).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeOp {
    /// 포지션 조회
    Position,
    /// 잔고 조회
    Balance,
    /// 가격 조회
    Price,
    /// 심볼 정밀도 조회
    ExchangeInfo,
    /// 레버리지 변경
    ChangeLeverage,
    /// 주문 제출
    PlaceOrder,
    /// 주문 조회
    GetOrder,
}

/// 성공적으로 실행된 계좌 변경 호출.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeCall {
    /// 레버리지 변경
    ChangeLeverage { symbol: String, leverage: u32 },
    /// 시장가 주문
    PlaceOrder(MarketOrderRequest),
}

/// 시뮬레이션 거래소 설정.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// 자산별 주문 가능 잔고
    pub balances: HashMap<String, Decimal>,
    /// 심볼별 가격
    pub prices: HashMap<String, Price>,
    /// 심볼별 수량 정밀도
    pub precisions: HashMap<String, u32>,
    /// 초기 포지션 기록 (심볼 → (수량, 레버리지))
    pub positions: HashMap<String, (Decimal, u32)>,
    /// 증거금 자산
    pub quote_asset: String,
    /// 포지션 기록이 없는 심볼에 주문할 때 적용되는 레버리지
    pub default_leverage: u32,
    /// 호출당 지연 시간
    pub latency: Duration,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        let mut balances = HashMap::new();
        balances.insert("USDT".to_string(), dec!(10000));

        Self {
            balances,
            prices: HashMap::new(),
            precisions: HashMap::new(),
            positions: HashMap::new(),
            quote_asset: "USDT".to_string(),
            default_leverage: 20,
            latency: Duration::ZERO,
        }
    }
}

impl SimulatedConfig {
    /// 자산 잔고를 설정합니다.
    pub fn with_balance(mut self, asset: &str, amount: Decimal) -> Self {
        self.balances.insert(asset.to_string(), amount);
        self
    }

    /// 거래 가능한 심볼을 등록합니다.
    pub fn with_symbol(mut self, symbol: &str, price: Price, quantity_precision: u32) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self.precisions.insert(symbol.to_string(), quantity_precision);
        self
    }

    /// 초기 포지션 기록을 설정합니다. 수량 0은 무포지션 기록입니다.
    pub fn with_position(mut self, symbol: &str, amount: Decimal, leverage: u32) -> Self {
        self.positions.insert(symbol.to_string(), (amount, leverage));
        self
    }

    /// 증거금 자산을 설정합니다.
    pub fn with_quote_asset(mut self, asset: &str) -> Self {
        self.quote_asset = asset.to_string();
        self
    }

    /// 호출당 지연 시간을 설정합니다.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// 주입된 장애.
#[derive(Debug, Clone)]
struct InjectedFailure {
    error: ExchangeError,
    /// 참이면 호출을 실제로 실행한 뒤 에러를 반환 (응답 유실 재현)
    after_execution: bool,
}

/// 내부 계좌 상태.
#[derive(Debug, Default)]
struct AccountState {
    quote_asset: String,
    balances: HashMap<String, Decimal>,
    prices: HashMap<String, Price>,
    precisions: HashMap<String, u32>,
    positions: HashMap<String, FuturesPosition>,
    orders: HashMap<String, OrderResult>,
    client_order_ids: HashMap<String, String>,
    next_order_id: u64,
    calls: Vec<ExchangeCall>,
    call_counts: HashMap<ExchangeOp, u32>,
    failures: HashMap<ExchangeOp, VecDeque<InjectedFailure>>,
}

impl AccountState {
    fn new(config: &SimulatedConfig) -> Self {
        let positions = config
            .positions
            .iter()
            .map(|(symbol, (amount, leverage))| {
                let price = config.prices.get(symbol).copied().unwrap_or_default();
                let entry_price = if amount.is_zero() { Decimal::ZERO } else { price };
                (
                    symbol.clone(),
                    FuturesPosition::new(symbol.clone(), *amount, *leverage).with_entry_price(entry_price),
                )
            })
            .collect();

        Self {
            quote_asset: config.quote_asset.clone(),
            balances: config.balances.clone(),
            prices: config.prices.clone(),
            precisions: config.precisions.clone(),
            positions,
            next_order_id: 1,
            ..Default::default()
        }
    }

    /// 호출 횟수를 기록하고 실행 전 장애가 있으면 반환합니다.
    fn begin(&mut self, op: ExchangeOp) -> Result<Option<ExchangeError>, ExchangeError> {
        *self.call_counts.entry(op).or_insert(0) += 1;

        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(failure) if failure.after_execution => Ok(Some(failure.error)),
            Some(failure) => Err(failure.error),
            None => Ok(None),
        }
    }

    fn price(&self, symbol: &str) -> ExchangeResult<Price> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    fn balance(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(asset))
            .map(|(_, amount)| *amount)
            .unwrap_or_default()
    }

    fn execute_order(&mut self, request: &MarketOrderRequest, default_leverage: u32) -> ExchangeResult<String> {
        // 클라이언트 주문 ID는 미체결 주문 사이에서만 고유
        if let Some(client_id) = &request.client_order_id {
            let open_duplicate = self
                .client_order_ids
                .get(client_id)
                .and_then(|id| self.orders.get(id))
                .is_some_and(|order| !order.status.is_final());
            if open_duplicate {
                return Err(ExchangeError::DuplicateClientOrderId(client_id.clone()));
            }
        }

        let price = self.price(&request.symbol)?;
        let precision = self.precisions.get(&request.symbol).copied().unwrap_or(0);

        if request.quantity <= Decimal::ZERO {
            return Err(ExchangeError::InvalidQuantity(format!(
                "quantity must be positive: {}",
                request.quantity
            )));
        }
        if request.quantity.normalize().scale() > precision {
            return Err(ExchangeError::InvalidQuantity(format!(
                "precision is over the maximum defined for {}: {}",
                request.symbol, request.quantity
            )));
        }

        let current = self.positions.get(&request.symbol).cloned();
        let current_amount = current.as_ref().map(|p| p.amount).unwrap_or_default();
        let leverage = current.as_ref().map_or(default_leverage, |p| p.leverage);

        let quantity = if request.reduce_only {
            let closes_position = current
                .as_ref()
                .and_then(FuturesPosition::close_side)
                .is_some_and(|side| side == request.side);
            if !closes_position {
                return Err(ExchangeError::OrderRejected(
                    "ReduceOnly Order is rejected.".to_string(),
                ));
            }
            request.quantity.min(current_amount.abs())
        } else {
            let available = self.balance(&self.quote_asset);
            let required_margin = request.quantity * price / Decimal::from(leverage.max(1));
            if required_margin > available {
                return Err(ExchangeError::InsufficientBalance(format!(
                    "margin {} exceeds available {}",
                    required_margin, available
                )));
            }
            request.quantity
        };

        let signed = match request.side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };
        let new_amount = current_amount + signed;
        let entry_price = if new_amount.is_zero() { Decimal::ZERO } else { price };
        self.positions.insert(
            request.symbol.clone(),
            FuturesPosition::new(request.symbol.clone(), new_amount, leverage).with_entry_price(entry_price),
        );

        let order_id = self.next_order_id.to_string();
        self.next_order_id += 1;

        let client_order_id = request
            .client_order_id
            .clone()
            .unwrap_or_else(|| format!("sim-{}", order_id));
        self.client_order_ids.insert(client_order_id.clone(), order_id.clone());
        self.orders.insert(
            order_id.clone(),
            OrderResult {
                order_id: order_id.clone(),
                client_order_id: Some(client_order_id),
                symbol: request.symbol.clone(),
                side: request.side,
                status: OrderStatusType::Filled,
                executed_quantity: quantity,
                average_price: price,
                leverage: None,
            },
        );
        self.calls.push(ExchangeCall::PlaceOrder(request.clone()));

        info!(
            order_id = %order_id,
            symbol = %request.symbol,
            side = %request.side,
            quantity = %quantity,
            position = %new_amount,
            "Simulated order filled"
        );
        Ok(order_id)
    }
}

/// 메모리 내 USDT-M 선물 거래소.
pub struct SimulatedFuturesExchange {
    state: Mutex<AccountState>,
    default_leverage: u32,
    latency: Duration,
}

impl SimulatedFuturesExchange {
    /// 새 시뮬레이션 거래소를 생성합니다.
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            state: Mutex::new(AccountState::new(&config)),
            default_leverage: config.default_leverage,
            latency: config.latency,
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// 다음 `op` 호출을 실행 전에 실패시킵니다. 여러 번 호출하면 순서대로 소비됩니다.
    pub async fn fail_next(&self, op: ExchangeOp, error: ExchangeError) {
        self.push_failure(op, error, false).await;
    }

    /// 다음 `op` 호출을 실행한 뒤 에러를 반환합니다 (응답 유실).
    pub async fn fail_next_after_execution(&self, op: ExchangeOp, error: ExchangeError) {
        self.push_failure(op, error, true).await;
    }

    async fn push_failure(&self, op: ExchangeOp, error: ExchangeError, after_execution: bool) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(InjectedFailure { error, after_execution });
    }

    /// 성공한 변경 호출 목록.
    pub async fn calls(&self) -> Vec<ExchangeCall> {
        self.state.lock().await.calls.clone()
    }

    /// 실패 포함 `op` 호출 횟수.
    pub async fn call_count(&self, op: ExchangeOp) -> u32 {
        self.state.lock().await.call_counts.get(&op).copied().unwrap_or(0)
    }

    /// 전체 호출 횟수.
    pub async fn total_calls(&self) -> u32 {
        self.state.lock().await.call_counts.values().sum()
    }

    /// 현재 포지션 기록.
    pub async fn position(&self, symbol: &str) -> Option<FuturesPosition> {
        self.state.lock().await.positions.get(symbol).cloned()
    }

    /// 가격을 변경합니다.
    pub async fn set_price(&self, symbol: &str, price: Price) {
        self.state.lock().await.prices.insert(symbol.to_string(), price);
    }

    /// 잔고를 변경합니다.
    pub async fn set_balance(&self, asset: &str, amount: Decimal) {
        self.state.lock().await.balances.insert(asset.to_string(), amount);
    }
}

#[async_trait]
impl FuturesExchange for SimulatedFuturesExchange {
    fn name(&self) -> &str {
        "simulated-futures"
    }

    async fn position_information(&self, symbol: &str) -> ExchangeResult<Option<FuturesPosition>> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::Position)?;
        let position = state.positions.get(symbol).cloned();
        late_error.map_or(Ok(position), Err)
    }

    async fn available_balance(&self, asset: &str) -> ExchangeResult<Decimal> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::Balance)?;
        let balance = state.balance(asset);
        late_error.map_or(Ok(balance), Err)
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<Price> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::Price)?;
        let price = state.price(symbol)?;
        late_error.map_or(Ok(price), Err)
    }

    async fn exchange_symbols(&self) -> ExchangeResult<Vec<SymbolPrecision>> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::ExchangeInfo)?;
        let mut symbols: Vec<SymbolPrecision> = state
            .precisions
            .iter()
            .map(|(symbol, precision)| SymbolPrecision::new(symbol.clone(), *precision))
            .collect();
        symbols.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        late_error.map_or(Ok(symbols), Err)
    }

    async fn change_leverage(&self, symbol: &str, leverage: u32) -> ExchangeResult<u32> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::ChangeLeverage)?;

        if !state.precisions.contains_key(symbol) {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        if !(1..=125).contains(&leverage) {
            return Err(ExchangeError::ApiError {
                code: -4028,
                message: format!("Leverage {} is not valid", leverage),
            });
        }

        state
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| FuturesPosition::new(symbol, Decimal::ZERO, leverage))
            .leverage = leverage;
        state.calls.push(ExchangeCall::ChangeLeverage {
            symbol: symbol.to_string(),
            leverage,
        });
        debug!(symbol, leverage, "Simulated leverage changed");

        late_error.map_or(Ok(leverage), Err)
    }

    async fn place_market_order(&self, request: &MarketOrderRequest) -> ExchangeResult<String> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::PlaceOrder)?;

        let order_id = state.execute_order(request, self.default_leverage)?;
        late_error.map_or(Ok(order_id), Err)
    }

    async fn get_order(&self, symbol: &str, order: &OrderRef) -> ExchangeResult<OrderResult> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let late_error = state.begin(ExchangeOp::GetOrder)?;

        let order_id = match order {
            OrderRef::Id(id) => Some(id.clone()),
            OrderRef::ClientId(client_id) => state.client_order_ids.get(client_id).cloned(),
        };
        let result = order_id
            .and_then(|id| state.orders.get(&id).cloned())
            .filter(|o| o.symbol == symbol)
            .ok_or_else(|| ExchangeError::OrderNotFound(order.to_string()))?;

        late_error.map_or(Ok(result), Err)
    }
}
