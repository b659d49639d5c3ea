//! 거래소 호출 재시도 정책.
//!
//! 일시적 장애(`ExchangeError::is_retryable`)만 재시도합니다. k번째(0부터) 실패 후
//! `base_delay * 2^k` 만큼 대기하며, 마지막 시도 뒤에는 대기하지 않습니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! let policy = RetryPolicy::default();
//! let balance = policy
//!     .run("get_balance", |_attempt| async { exchange.available_balance("USDT").await })
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};
use trader_core::RetryConfig;

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함).
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// 새 정책 생성.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// `failed_attempt`번째(0부터) 실패 후 대기 시간.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(failed_attempt))
    }

    /// 작업을 정책에 따라 실행합니다.
    ///
    /// `operation`은 현재 시도 번호(0부터)를 받습니다. 소진 시 마지막 에러를
    /// 종류 변경 없이 반환합니다.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> ExchangeResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(operation = operation_name, error = %e, "Non-retryable error");
                    return Err(e);
                }
                Err(e) if attempt + 1 >= max_attempts => {
                    error!(
                        operation = operation_name,
                        error = %e,
                        attempts = attempt + 1,
                        "Retries exhausted"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = operation_name,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient error, retrying"
                    );
                    metrics::counter!(
                        "exchange_retries_total",
                        "operation" => operation_name.to_string(),
                        "kind" => e.kind()
                    )
                    .increment(1);

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    };

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 250,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let policy = RetryPolicy::default();
        let result = policy.run("op", |_| async { Ok::<_, ExchangeError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_errors() {
        let policy = RetryPolicy::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = policy
            .run("op", |_| {
                let counter = counter.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(ExchangeError::NetworkError("connection reset".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_uses_exponential_delays() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(Mutex::new(Vec::new()));

        let result = policy
            .run("op", |attempt| {
                let attempts = attempts.clone();
                async move {
                    attempts.lock().unwrap().push((attempt, Instant::now()));
                    Err::<(), _>(ExchangeError::Timeout("read timed out".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(ExchangeError::Timeout(_))));

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 5);
        let numbers: Vec<u32> = attempts.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);

        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1].1 - w[0].1).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sleep_after_final_attempt() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let start = Instant::now();

        let result = policy
            .run("op", |_| async { Err::<(), _>(ExchangeError::RateLimited) })
            .await;

        assert_eq!(result, Err(ExchangeError::RateLimited));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_no_retry_on_business_error() {
        let policy = RetryPolicy::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = policy
            .run("op", |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ExchangeError::InsufficientBalance("margin".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(ExchangeError::InsufficientBalance(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
