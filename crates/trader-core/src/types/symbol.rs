//! USDT-M 선물 심볼 정규화.

/// 외부 입력 심볼을 거래소 형식(`BTCUSDT`)으로 정규화합니다.
///
/// 앞뒤 공백과 `/` 구분자를 제거하고 대문자로 변환합니다.
/// 결과가 비었거나 영숫자가 아닌 문자가 남으면 `None`을 반환합니다.
pub fn normalize_futures_symbol(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '/')
        .collect::<String>()
        .to_uppercase();

    if normalized.is_empty() || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(normalized)
}
