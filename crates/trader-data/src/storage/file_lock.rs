//! 프로세스 간 advisory 파일 락.
//!
//! 여러 모니터 프로세스가 같은 캐시 디렉토리를 공유하므로 프로세스 내부 Mutex만으로는
//! 부족합니다. 데이터 파일 옆의 `.lock` 파일에 shared/exclusive 락을 걸고,
//! 경합 시 지수 백오프로 제한된 횟수만큼 재시도합니다.
//!
//! ```text
//! 읽기:   shared   ── load ── unlock
//! 쓰기:   exclusive ── load ── modify ── save(tmp → rename) ── unlock
//! ```

use crate::error::{DataError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{trace, warn};
use trader_core::LockConfig;

/// 락 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// 읽기 전용 (여러 프로세스 동시 보유 가능)
    Shared,
    /// 읽기-수정-쓰기 (단독 보유)
    Exclusive,
}

/// 락 경합 시 재시도 정책.
#[derive(Debug, Clone)]
pub struct LockRetryPolicy {
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 대기
    pub base_delay: Duration,
    /// 재시도 대기 상한
    pub max_delay: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self::from(&LockConfig::default())
    }
}

impl From<&LockConfig> for LockRetryPolicy {
    fn from(config: &LockConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl LockRetryPolicy {
    /// `attempt`번째 실패 후 대기 시간 (base × 2^attempt, 상한 적용).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// `.lock` 파일 기반 락.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    policy: LockRetryPolicy,
}

/// 보유 중인 락. drop 시 해제됩니다.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLockGuard {
    /// 락 모드.
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "파일 락 해제 실패");
        }
    }
}

impl FileLock {
    /// 새 파일 락 생성. 락 파일은 첫 획득 시 만들어집니다.
    pub fn new(path: impl Into<PathBuf>, policy: LockRetryPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// 데이터 파일 경로에서 `{file}.lock` 경로의 락 생성.
    pub fn for_data_file(data_path: &Path, policy: LockRetryPolicy) -> Self {
        let mut name = data_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        Self::new(data_path.with_file_name(name), policy)
    }

    /// 락 파일 경로.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// shared 락 획득.
    pub async fn shared(&self) -> Result<FileLockGuard> {
        self.acquire(LockMode::Shared).await
    }

    /// exclusive 락 획득.
    pub async fn exclusive(&self) -> Result<FileLockGuard> {
        self.acquire(LockMode::Exclusive).await
    }

    /// 락 획득. 경합이면 백오프 후 재시도하고, 한도 초과 시 `LockTimeout`.
    pub async fn acquire(&self, mode: LockMode) -> Result<FileLockGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let contended = fs2::lock_contended_error().kind();
        for attempt in 0..self.policy.max_attempts {
            let result = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };

            match result {
                Ok(()) => {
                    trace!(path = %self.path.display(), ?mode, attempt, "파일 락 획득");
                    return Ok(FileLockGuard {
                        file,
                        path: self.path.clone(),
                        mode,
                    });
                }
                Err(e) if e.kind() == contended => {
                    if attempt + 1 < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            path = %self.path.display(),
            ?mode,
            attempts = self.policy.max_attempts,
            "파일 락 획득 실패"
        );
        Err(DataError::LockTimeout {
            path: self.path.clone(),
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> LockRetryPolicy {
        LockRetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_backoff_is_capped() {
        let policy = LockRetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(20));
        assert_eq!(policy.delay_for(2), Duration::from_millis(80));
        assert_eq!(policy.delay_for(10), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_lock_path_for_data_file() {
        let lock = FileLock::for_data_file(Path::new("/var/cache/quotes.json"), fast_policy(1));
        assert_eq!(lock.path(), Path::new("/var/cache/quotes.json.lock"));
    }

    #[tokio::test]
    async fn test_shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("a.lock"), fast_policy(2));

        let first = lock.shared().await.unwrap();
        let second = lock.shared().await.unwrap();
        assert_eq!(first.mode(), LockMode::Shared);
        assert_eq!(second.mode(), LockMode::Shared);
    }

    #[tokio::test]
    async fn test_exclusive_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("b.lock"), fast_policy(3));

        let held = lock.exclusive().await.unwrap();
        let err = lock.exclusive().await.unwrap_err();
        assert!(matches!(err, DataError::LockTimeout { attempts: 3, .. }));
        assert!(lock.shared().await.is_err());

        drop(held);
        assert!(lock.exclusive().await.is_ok());
    }
}
