//! 심볼별 조정 직렬화.
//!
//! 같은 심볼에 대한 조정은 하나씩 실행되고, 다른 심볼은 병렬로 실행됩니다.
//! 잠금 항목은 보유자와 대기자가 모두 사라지면 맵에서 제거됩니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 심볼 잠금과 이를 사용 중인 (보유 + 대기) 조정 수.
#[derive(Debug, Default)]
struct LockEntry {
    lock: Arc<Mutex<()>>,
    users: usize,
}

/// 심볼별 잠금 맵. 맵 자체는 await 없이 짧게만 잠급니다.
type LockMap = Arc<StdMutex<HashMap<String, LockEntry>>>;

fn lock_map(locks: &LockMap) -> MutexGuard<'_, HashMap<String, LockEntry>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 심볼 단위 잠금.
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: LockMap,
}

/// 잠금 사용 등록. 드롭되면 사용 수를 줄이고 마지막 사용자면 항목을 제거합니다.
#[derive(Debug)]
struct SymbolLease {
    symbol: String,
    locks: LockMap,
}

impl Drop for SymbolLease {
    fn drop(&mut self) {
        let mut locks = lock_map(&self.locks);
        if let Some(entry) = locks.get_mut(&self.symbol) {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                locks.remove(&self.symbol);
            }
        }
    }
}

/// 획득한 심볼 잠금. 드롭 시 해제됩니다.
#[derive(Debug)]
pub struct SymbolLockGuard {
    // 필드 순서대로 드롭: Mutex 해제 후 등록 해제
    _guard: OwnedMutexGuard<()>,
    _lease: SymbolLease,
}

impl SymbolLocks {
    /// 빈 잠금 맵 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼 잠금을 가져오거나 생성하고 사용자로 등록합니다.
    fn register(&self, symbol: &str) -> (Arc<Mutex<()>>, SymbolLease) {
        let mut locks = lock_map(&self.locks);
        let entry = locks.entry(symbol.to_string()).or_default();
        entry.users += 1;

        let lease = SymbolLease {
            symbol: symbol.to_string(),
            locks: Arc::clone(&self.locks),
        };
        (entry.lock.clone(), lease)
    }

    /// 심볼 잠금을 획득합니다. 가드가 해제될 때까지 같은 심볼의 다른 조정은 대기합니다.
    ///
    /// 대기 중 취소되어도 (예: 타임아웃) 등록은 해제됩니다.
    pub async fn acquire(&self, symbol: &str) -> SymbolLockGuard {
        let (lock, lease) = self.register(symbol);
        let guard = lock.lock_owned().await;
        SymbolLockGuard {
            _guard: guard,
            _lease: lease,
        }
    }

    /// 현재 잠금을 보유하거나 대기 중인 심볼 수.
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    /// 사용 중인 잠금이 하나도 없는지 확인.
    pub fn is_empty(&self) -> bool {
        lock_map(&self.locks).is_empty()
    }
}
