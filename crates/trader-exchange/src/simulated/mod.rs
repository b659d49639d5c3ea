//! 모의 운영 및 테스트를 위한 시뮬레이션 선물 거래소.
//!
//! 이 모듈은 다음 기능을 제공합니다:
//! - 메모리 내 USDT-M 선물 계좌 (잔고, 가격, 정밀도, 순포지션, 레버리지)
//! - 시장가 주문 즉시 체결 및 reduce-only 처리
//! - 클라이언트 주문 ID 중복 검사
//! - 작업별 장애 주입 (실행 전/실행 후)
//! - 변경 호출 기록 (레버리지 변경, 주문 제출)
//!
//! # 예제
//!
//! ```ignore
//! use trader_exchange::simulated::{SimulatedConfig, SimulatedFuturesExchange};
//!
//! let config = SimulatedConfig::default()
//!     .with_balance("USDT", dec!(1000))
//!     .with_symbol("BTCUSDT", dec!(25000), 3)
//!     .with_position("BTCUSDT", dec!(0.5), 5);
//!
//! let exchange = SimulatedFuturesExchange::new(config);
//! ```

mod exchange;

pub use exchange::{ExchangeCall, ExchangeOp, SimulatedConfig, SimulatedFuturesExchange};
