//! 거래소 연결 및 호출 복원력.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `FuturesExchange` trait: USDT-M 선물 계좌에 대한 원격 호출 인터페이스
//! - Binance USDT-M 선물 REST 커넥터
//! - 시뮬레이션 선물 거래소 (모의 운영 및 테스트용, 장애 주입 지원)
//! - `RetryPolicy`: 일시적 장애에 대한 지수 백오프 재시도
//! - `ExchangeGateway`: 모든 호출을 재시도 정책으로 감싸는 게이트웨이

pub mod connector;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod simulated;
pub mod traits;

pub use connector::{BinanceFuturesClient, BinanceFuturesConfig};
pub use error::*;
pub use gateway::ExchangeGateway;
pub use retry::RetryPolicy;
pub use simulated::{ExchangeCall, ExchangeOp, SimulatedConfig, SimulatedFuturesExchange};
pub use traits::*;
