//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/trade` - 구조화된 시그널
//! - `/webhook` - 텍스트 시그널

pub mod health;
pub mod trade;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use trade::{trade_router, TradeRequest, TradeResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .merge(trade_router())
}
