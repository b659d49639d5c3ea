//! 포지션 조정기.
//!
//! 시그널의 목표 순포지션과 거래소의 실제 포지션을 비교하여 필요한 최소한의
//! 작업(청산, 레버리지 변경, 진입)을 순서대로 실행합니다.
//!
//! | 현재 수량 | 목표 | 작업 |
//! |---|---|---|
//! | 0 / 기록 없음 | 0 | 레버리지 정렬만 |
//! | 0 / 기록 없음 | ≠0 | 레버리지 정렬 후 진입 |
//! | ≠0 같은 방향 | 같은 방향 | 없음 (부분 조정 없음) |
//! | ≠0 | 0 또는 반대 방향 | 전량 청산, 레버리지 정렬, 목표 ≠ 0이면 진입 |
//!
//! 조정 도중 실패하면 나머지 단계는 중단되며 이미 실행된 주문은 되돌리지 않습니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};
use trader_core::{
    DecimalExt, FuturesPosition, MarketOrderRequest, OrderResult, Price, Quantity, Side,
    TradingSignal,
};
use trader_exchange::{ExchangeError, ExchangeGateway};
use uuid::Uuid;

use crate::sizer::{QuantitySizer, SizingError};
use crate::symbol_lock::SymbolLocks;

// ==================== 에러 ====================

/// 조정 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStep {
    FetchPosition,
    ClosePosition,
    SetLeverage,
    FetchBalance,
    FetchPrice,
    FetchPrecision,
    OpenPosition,
}

impl ReconcileStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStep::FetchPosition => "fetch_position",
            ReconcileStep::ClosePosition => "close_position",
            ReconcileStep::SetLeverage => "set_leverage",
            ReconcileStep::FetchBalance => "fetch_balance",
            ReconcileStep::FetchPrice => "fetch_price",
            ReconcileStep::FetchPrecision => "fetch_precision",
            ReconcileStep::OpenPosition => "open_position",
        }
    }
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 조정 오류 유형.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    /// 거래소가 업무 오류로 거부 (재시도하지 않음)
    #[error("Exchange rejected {step}: {source}")]
    ExchangeRejection {
        step: ReconcileStep,
        source: ExchangeError,
    },

    /// 일시적 오류가 재시도 한도를 넘김
    #[error("{step} failed after retries: {source}")]
    TransientExhausted {
        step: ReconcileStep,
        source: ExchangeError,
    },

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: Price },

    #[error("Reconciliation timed out after {0:?}")]
    Timeout(Duration),
}

impl ReconcileError {
    /// 게이트웨이 오류를 단계 정보와 함께 분류합니다.
    fn from_exchange(step: ReconcileStep, symbol: &str, err: ExchangeError) -> Self {
        match err {
            ExchangeError::SymbolNotFound(_) => ReconcileError::UnknownSymbol(symbol.to_string()),
            err if err.is_retryable() => ReconcileError::TransientExhausted { step, source: err },
            err => ReconcileError::ExchangeRejection { step, source: err },
        }
    }

    /// 실패한 단계 (해당하는 경우).
    pub fn step(&self) -> Option<ReconcileStep> {
        match self {
            ReconcileError::ExchangeRejection { step, .. }
            | ReconcileError::TransientExhausted { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// 메트릭 라벨용 분류명.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::ExchangeRejection { .. } => "exchange_rejection",
            ReconcileError::TransientExhausted { .. } => "transient_exhausted",
            ReconcileError::UnknownSymbol(_) => "unknown_symbol",
            ReconcileError::InvalidPrice { .. } => "invalid_price",
            ReconcileError::Timeout(_) => "timeout",
        }
    }
}

impl From<SizingError> for ReconcileError {
    fn from(err: SizingError) -> Self {
        match err {
            SizingError::UnknownSymbol(symbol) => ReconcileError::UnknownSymbol(symbol),
            SizingError::InvalidPrice { symbol, price } => ReconcileError::InvalidPrice { symbol, price },
        }
    }
}

// ==================== 결과 ====================

/// 조정 결과 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// 아무 작업 없음
    NoOp,
    /// 레버리지만 변경
    LeverageOnly,
    /// 청산만 실행
    Close,
    /// 청산 후 반대 방향 진입
    CloseAndOpen,
    /// 신규 진입
    Open,
}

impl ReconcileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileAction::NoOp => "no_op",
            ReconcileAction::LeverageOnly => "leverage_only",
            ReconcileAction::Close => "close",
            ReconcileAction::CloseAndOpen => "close_and_open",
            ReconcileAction::Open => "open",
        }
    }
}

/// 레버리지 변경 내역.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeverageChange {
    /// 변경 전 레버리지 (포지션 기록이 없으면 `None`)
    pub from: Option<u32>,
    pub to: u32,
}

/// 조정 1회의 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub reconcile_id: Uuid,
    pub symbol: String,
    pub is_test: bool,
    pub action: ReconcileAction,
    /// 조정 전 순포지션
    pub previous_amount: Quantity,
    pub target_position_size: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage_change: Option<LeverageChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_order: Option<OrderResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_order: Option<OrderResult>,
    /// 진입이 필요했지만 수량이 0으로 계산됨
    pub insufficient_balance: bool,
}

impl ReconcileReport {
    fn new(reconcile_id: Uuid, signal: &TradingSignal, previous_amount: Quantity) -> Self {
        Self {
            reconcile_id,
            symbol: signal.symbol.clone(),
            is_test: signal.is_test,
            action: ReconcileAction::NoOp,
            previous_amount,
            target_position_size: signal.target_position_size,
            leverage_change: None,
            close_order: None,
            open_order: None,
            insufficient_balance: false,
        }
    }

    fn resolve_action(&mut self) {
        self.action = match (self.close_order.is_some(), self.open_order.is_some()) {
            (true, true) => ReconcileAction::CloseAndOpen,
            (true, false) => ReconcileAction::Close,
            (false, true) => ReconcileAction::Open,
            (false, false) if self.leverage_change.is_some() => ReconcileAction::LeverageOnly,
            (false, false) => ReconcileAction::NoOp,
        };
    }

    /// 호출자에게 돌려줄 대표 주문. 진입 주문이 있으면 진입, 없으면 청산 주문.
    pub fn primary_order(&self) -> Option<&OrderResult> {
        self.open_order.as_ref().or(self.close_order.as_ref())
    }

    /// 사람이 읽을 수 있는 결과 메시지.
    pub fn summary_message(&self) -> String {
        let mode = if self.is_test { "Test" } else { "Live" };
        match self.action {
            ReconcileAction::CloseAndOpen | ReconcileAction::Open => {
                format!("{} trade executed", mode)
            }
            ReconcileAction::Close if self.insufficient_balance => format!(
                "{} trade executed: position closed, balance insufficient to open",
                mode
            ),
            ReconcileAction::Close => format!("{} trade executed: position closed", mode),
            ReconcileAction::LeverageOnly | ReconcileAction::NoOp if self.insufficient_balance => {
                format!("{} trade skipped: balance insufficient to open", mode)
            }
            ReconcileAction::LeverageOnly => {
                format!("Leverage aligned, no order required ({})", mode.to_lowercase())
            }
            ReconcileAction::NoOp if !self.previous_amount.is_zero() => {
                "Position already in target direction, no action taken".to_string()
            }
            ReconcileAction::NoOp => "Target already satisfied, no action taken".to_string(),
        }
    }
}

// ==================== 조정기 ====================

/// 시그널 기반 포지션 조정기.
///
/// 상태를 보관하지 않으며 매 호출마다 거래소 상태를 새로 조회합니다.
/// 같은 심볼의 조정은 `SymbolLocks`로 직렬화됩니다.
#[derive(Debug, Clone)]
pub struct PositionReconciler {
    gateway: ExchangeGateway,
    locks: Arc<SymbolLocks>,
    desired_leverage: u32,
}

impl PositionReconciler {
    /// 새 조정기 생성.
    pub fn new(gateway: ExchangeGateway, desired_leverage: u32) -> Self {
        Self {
            gateway,
            locks: Arc::new(SymbolLocks::new()),
            desired_leverage,
        }
    }

    /// 다른 조정기와 심볼 잠금을 공유합니다.
    pub fn with_locks(mut self, locks: Arc<SymbolLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn desired_leverage(&self) -> u32 {
        self.desired_leverage
    }

    pub fn gateway(&self) -> &ExchangeGateway {
        &self.gateway
    }

    /// 시그널에 맞춰 포지션을 조정합니다.
    pub async fn reconcile(&self, signal: &TradingSignal) -> Result<ReconcileReport, ReconcileError> {
        let reconcile_id = Uuid::new_v4();
        let span = trader_core::reconcile_span!(signal.symbol, reconcile_id);

        async move {
            let _guard = self.locks.acquire(&signal.symbol).await;

            info!(
                target_position_size = %signal.target_position_size,
                is_test = signal.is_test,
                "조정 시작"
            );

            let result = self.reconcile_locked(signal, reconcile_id).await;
            match &result {
                Ok(report) => info!(
                    action = report.action.as_str(),
                    insufficient_balance = report.insufficient_balance,
                    "조정 완료"
                ),
                Err(e) => error!(
                    error = %e,
                    step = e.step().map(|s| s.as_str()),
                    "조정 실패, 남은 단계 중단"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// 전체 소요 시간(잠금 대기 포함)을 제한하여 조정합니다.
    ///
    /// 시간 초과 시 이미 실행된 작업은 되돌리지 않습니다.
    pub async fn reconcile_with_timeout(
        &self,
        signal: &TradingSignal,
        timeout: Duration,
    ) -> Result<ReconcileReport, ReconcileError> {
        match tokio::time::timeout(timeout, self.reconcile(signal)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(symbol = %signal.symbol, timeout_ms = timeout.as_millis() as u64, "Reconciliation timed out");
                Err(ReconcileError::Timeout(timeout))
            }
        }
    }

    async fn reconcile_locked(
        &self,
        signal: &TradingSignal,
        reconcile_id: Uuid,
    ) -> Result<ReconcileReport, ReconcileError> {
        let symbol = signal.symbol.as_str();
        let target = signal.target_position_size;

        let position = self
            .gateway
            .get_position(symbol)
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::FetchPosition, symbol, e))?;

        let current_amount = position.as_ref().map(|p| p.amount).unwrap_or(Decimal::ZERO);
        let mut report = ReconcileReport::new(reconcile_id, signal, current_amount);

        if current_amount.same_sign(&target) {
            info!(
                current_amount = %current_amount,
                target = %target,
                "Position already in target direction, no action"
            );
            return Ok(report);
        }

        if let Some(position) = position.as_ref().filter(|p| !p.is_flat()) {
            report.close_order = Some(self.close_position(position).await?);
        }

        let current_leverage = position.as_ref().map(|p| p.leverage);
        if current_leverage != Some(self.desired_leverage) {
            report.leverage_change = Some(self.align_leverage(symbol, current_leverage).await?);
        }

        if let Some(side) = Side::for_amount(target) {
            match self.open_position(symbol, side).await? {
                Some(order) => report.open_order = Some(order),
                None => report.insufficient_balance = true,
            }
        }

        report.resolve_action();
        Ok(report)
    }

    async fn close_position(&self, position: &FuturesPosition) -> Result<OrderResult, ReconcileError> {
        let symbol = position.symbol.as_str();
        let Some(side) = position.close_side() else {
            return Err(ReconcileError::ExchangeRejection {
                step: ReconcileStep::ClosePosition,
                source: ExchangeError::InvalidQuantity("position is already flat".to_string()),
            });
        };

        let request = MarketOrderRequest::close(symbol, side, position.abs_amount())
            .with_client_id(client_order_id("c"));
        info!(
            side = %side,
            quantity = %request.quantity,
            client_order_id = request.client_order_id.as_deref().unwrap_or_default(),
            "기존 포지션 청산"
        );

        self.gateway
            .place_market_order(&request)
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::ClosePosition, symbol, e))
    }

    async fn align_leverage(
        &self,
        symbol: &str,
        current: Option<u32>,
    ) -> Result<LeverageChange, ReconcileError> {
        let applied = self
            .gateway
            .set_leverage(symbol, self.desired_leverage)
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::SetLeverage, symbol, e))?;

        info!(from = ?current, to = applied, "레버리지 변경");
        Ok(LeverageChange { from: current, to: applied })
    }

    /// 가용 잔고 전액으로 진입합니다. 수량이 0이면 `None`.
    async fn open_position(&self, symbol: &str, side: Side) -> Result<Option<OrderResult>, ReconcileError> {
        let balance = self
            .gateway
            .get_balance()
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::FetchBalance, symbol, e))?;
        let price = self
            .gateway
            .get_price(symbol)
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::FetchPrice, symbol, e))?;
        let precisions = self
            .gateway
            .get_symbol_precisions()
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::FetchPrecision, symbol, e))?;

        let quantity = QuantitySizer::from_precisions(precisions).compute_quantity(symbol, balance, price)?;
        if quantity.is_zero() {
            warn!(
                balance = %balance,
                price = %price,
                "Insufficient balance to open position"
            );
            return Ok(None);
        }

        let request = MarketOrderRequest::open(symbol, side, quantity).with_client_id(client_order_id("o"));
        info!(
            side = %side,
            quantity = %quantity,
            balance = %balance,
            price = %price,
            client_order_id = request.client_order_id.as_deref().unwrap_or_default(),
            "신규 포지션 진입"
        );

        let order = self
            .gateway
            .place_market_order(&request)
            .await
            .map_err(|e| ReconcileError::from_exchange(ReconcileStep::OpenPosition, symbol, e))?;

        Ok(Some(order.with_leverage(self.desired_leverage)))
    }
}

/// 단계별 클라이언트 주문 ID. 재시도 간에는 같은 값을 재사용합니다.
fn client_order_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}
