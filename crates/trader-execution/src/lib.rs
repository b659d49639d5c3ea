//! 시그널 기반 포지션 조정.
//!
//! 이 crate는 다음을 제공합니다:
//! - 잔고/가격/정밀도 기반 주문 수량 계산 (`QuantitySizer`)
//! - 심볼별 조정 직렬화 (`SymbolLocks`)
//! - 목표 포지션과 실제 포지션을 일치시키는 조정기 (`PositionReconciler`)
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::PositionReconciler;
//!
//! let reconciler = PositionReconciler::new(gateway, 3);
//! let report = reconciler.reconcile(&signal).await?;
//! println!("{}", report.summary_message());
//! ```

pub mod reconciler;
pub mod sizer;
pub mod symbol_lock;

// 주요 타입 재내보내기
pub use reconciler::{
    LeverageChange, PositionReconciler, ReconcileAction, ReconcileError, ReconcileReport,
    ReconcileStep,
};
pub use sizer::{QuantitySizer, SizingError};
pub use symbol_lock::{SymbolLockGuard, SymbolLocks};
