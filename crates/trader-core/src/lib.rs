//! # Trader Core
//!
//! 시그널 기반 포지션 조정 시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 주문 방향, 시장가 주문 요청, 주문 결과
//! - 선물 포지션 및 심볼 정밀도
//! - 트레이딩 시그널과 웹훅 메시지 파싱
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
