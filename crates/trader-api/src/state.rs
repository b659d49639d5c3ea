//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 여러 요청 간에 공유됩니다.

use std::time::Duration;

use trader_execution::PositionReconciler;

/// 애플리케이션 공유 상태.
#[derive(Debug, Clone)]
pub struct AppState {
    /// 포지션 조정기 (거래소 게이트웨이와 심볼 잠금 포함)
    pub reconciler: PositionReconciler,

    /// 조정 1회의 최대 소요 시간
    pub reconcile_timeout: Duration,

    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새 AppState 생성.
    pub fn new(reconciler: PositionReconciler, reconcile_timeout: Duration) -> Self {
        Self {
            reconciler,
            reconcile_timeout,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 연결된 거래소 이름.
    pub fn exchange_name(&self) -> &str {
        self.reconciler.gateway().exchange_name()
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

/// 테스트용 AppState 생성.
///
/// BTCUSDT(25000, 정밀도 3)와 ETHUSDT(2000, 정밀도 3)가 등록된 시뮬레이션 거래소를 사용합니다.
/// 재시도 없이 동작합니다.
#[cfg(test)]
pub fn create_test_state() -> AppState {
    use rust_decimal::Decimal;
    use trader_exchange::simulated::{SimulatedConfig, SimulatedFuturesExchange};

    let exchange = SimulatedFuturesExchange::new(
        SimulatedConfig::default()
            .with_balance("USDT", Decimal::from(1000))
            .with_symbol("BTCUSDT", Decimal::from(25000), 3)
            .with_symbol("ETHUSDT", Decimal::from(2000), 3),
    );
    create_test_state_with(std::sync::Arc::new(exchange))
}

/// 주어진 시뮬레이션 거래소로 테스트용 AppState 생성.
#[cfg(test)]
pub fn create_test_state_with(
    exchange: std::sync::Arc<trader_exchange::simulated::SimulatedFuturesExchange>,
) -> AppState {
    use trader_exchange::{ExchangeGateway, RetryPolicy};

    let gateway = ExchangeGateway::new(exchange, RetryPolicy::no_retry());
    AppState::new(PositionReconciler::new(gateway, 3), Duration::from_secs(5))
}
