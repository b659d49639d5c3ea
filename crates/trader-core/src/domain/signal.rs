//! 외부 트레이딩 시그널.
//!
//! 시그널은 심볼의 목표 순포지션 크기를 나타냅니다. JSON 요청이나
//! 알림 서비스의 웹훅 텍스트에서 생성됩니다.
//!
//! 웹훅 텍스트 형식 예:
//! `策略测试成交BTCUSDT。新策略仓位-0.3`
//! - 심볼: `成交`과 다음 `。` 사이의 단어 문자
//! - 목표 포지션: `新策略仓位` 바로 뒤의 부호 있는 소수
//! - `测试`가 포함되면 테스트 시그널

use crate::domain::Side;
use crate::types::{normalize_futures_symbol, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// 심볼 토큰 앞의 표지.
pub const SYMBOL_MARKER: &str = "成交";
/// 심볼 토큰의 종결 문자.
pub const SYMBOL_TERMINATOR: char = '。';
/// 목표 포지션 토큰 앞의 표지.
pub const POSITION_MARKER: &str = "新策略仓位";
/// 테스트 시그널 표지.
pub const TEST_MARKER: &str = "测试";

/// 시그널 검증 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// 웹훅 텍스트에 심볼 토큰 없음
    #[error("webhook message has no symbol token (成交<SYMBOL>。)")]
    MissingSymbol,

    /// 웹훅 텍스트에 목표 포지션 토큰 없음
    #[error("webhook message has no position token (新策略仓位<SIZE>)")]
    MissingPositionSize,

    /// 심볼 형식 오류
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// 목표 포지션 형식 오류
    #[error("invalid position size: {0:?}")]
    InvalidPositionSize(String),
}

/// 목표 순포지션을 나타내는 트레이딩 시그널.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingSignal {
    /// 정규화된 심볼 (예: BTCUSDT)
    pub symbol: String,
    /// 부호 있는 목표 포지션 크기 (양수 = 롱, 음수 = 숏, 0 = 청산)
    pub target_position_size: Quantity,
    /// 테스트 시그널 여부 (보고 메시지에만 영향)
    pub is_test: bool,
}

impl TradingSignal {
    /// 심볼을 정규화하여 새 시그널을 생성합니다.
    pub fn new(symbol: &str, target_position_size: Quantity, is_test: bool) -> Result<Self, SignalError> {
        let symbol =
            normalize_futures_symbol(symbol).ok_or_else(|| SignalError::InvalidSymbol(symbol.to_string()))?;
        Ok(Self {
            symbol,
            target_position_size,
            is_test,
        })
    }

    /// 웹훅 텍스트에서 시그널을 파싱합니다.
    pub fn from_webhook_text(text: &str) -> Result<Self, SignalError> {
        let symbol = extract_symbol(text).ok_or(SignalError::MissingSymbol)?;
        let size_token = extract_position_size(text).ok_or(SignalError::MissingPositionSize)?;
        let target = Decimal::from_str(size_token)
            .map_err(|_| SignalError::InvalidPositionSize(size_token.to_string()))?;

        Self::new(symbol, target, text.contains(TEST_MARKER))
    }

    /// 목표 방향. 목표가 0이면 `None`.
    pub fn target_side(&self) -> Option<Side> {
        Side::for_amount(self.target_position_size)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// 첫 번째 `成交<단어>。` 패턴의 단어 부분.
fn extract_symbol(text: &str) -> Option<&str> {
    text.match_indices(SYMBOL_MARKER).find_map(|(idx, marker)| {
        let rest = &text[idx + marker.len()..];
        let end = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
        if end > 0 && rest[end..].starts_with(SYMBOL_TERMINATOR) {
            Some(&rest[..end])
        } else {
            None
        }
    })
}

/// 첫 번째 `新策略仓位` 뒤의 `-?\d+(\.\d+)?` 토큰.
fn extract_position_size(text: &str) -> Option<&str> {
    text.match_indices(POSITION_MARKER).find_map(|(idx, marker)| {
        let rest = &text[idx + marker.len()..];
        let bytes = rest.as_bytes();
        let mut end = usize::from(bytes.first() == Some(&b'-'));

        let int_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == int_start {
            return None;
        }

        if bytes.get(end) == Some(&b'.') {
            let frac_start = end + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                frac_end += 1;
            }
            if frac_end > frac_start {
                end = frac_end;
            }
        }
        Some(&rest[..end])
    })
}
