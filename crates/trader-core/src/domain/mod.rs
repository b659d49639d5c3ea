//! 시그널 기반 포지션 조정을 위한 도메인 모델.

mod order;
mod position;
mod precision;
mod signal;

pub use order::*;
pub use position::*;
pub use precision::*;
pub use signal::*;
