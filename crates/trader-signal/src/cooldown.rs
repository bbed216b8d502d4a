//! 알림 쿨다운 장부.
//!
//! (심볼, 알림 종류)별 마지막 발송 시각을 `cooldown.json`에 보관합니다.
//! 재시작한 프로세스도 직전에 보낸 알림을 다시 보내지 않습니다.
//!
//! 쿨다운 길이는 호출마다 전달받습니다. 종류별 기본값은 `CooldownConfig`에 있습니다.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use trader_core::{AlertKind, CacheConfig};
use trader_data::{LockRetryPolicy, LockedJsonFile, Result};

/// 장부 파일 이름.
pub const COOLDOWN_FILE: &str = "cooldown.json";

/// `"SYMBOL|kind"` → 마지막 발송 시각
type Ledger = BTreeMap<String, DateTime<Utc>>;

/// 영속 쿨다운 장부.
pub struct CooldownLedger {
    file: LockedJsonFile,
}

impl CooldownLedger {
    /// `dir` 아래 `cooldown.json`을 사용하는 장부 생성.
    pub fn new(dir: impl AsRef<Path>, policy: LockRetryPolicy) -> Self {
        Self {
            file: LockedJsonFile::new(dir.as_ref().join(COOLDOWN_FILE), policy),
        }
    }

    /// 설정의 캐시 디렉토리로 생성.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.dir, LockRetryPolicy::from(&config.lock))
    }

    /// 장부 파일 경로.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// 장부 키.
    pub fn key(symbol: &str, kind: AlertKind) -> String {
        format!("{}|{}", symbol, kind)
    }

    /// 기록이 없거나 마지막 발송 후 `cooldown` 이상 지났으면 `true`.
    pub async fn allow(&self, symbol: &str, kind: AlertKind, cooldown: Duration) -> Result<bool> {
        self.allow_at(symbol, kind, cooldown, Utc::now()).await
    }

    /// `allow`와 같지만 현재 시각을 지정합니다.
    pub async fn allow_at(
        &self,
        symbol: &str,
        kind: AlertKind,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let ledger: Ledger = self.file.read().await?;
        Ok(is_allowed(ledger.get(&Self::key(symbol, kind)), cooldown, now))
    }

    /// 발송 시각을 기록합니다. 기존 기록을 무조건 덮어씁니다.
    pub async fn record(&self, symbol: &str, kind: AlertKind, when: DateTime<Utc>) -> Result<()> {
        let key = Self::key(symbol, kind);
        self.file
            .modify(|ledger: &mut Ledger| {
                ledger.insert(key, when);
                ((), true)
            })
            .await?;
        debug!(symbol, kind = %kind, at = %when, "쿨다운 기록");
        Ok(())
    }

    /// 허용 확인과 기록을 하나의 exclusive 락 안에서 수행합니다.
    ///
    /// 허용되면 `now`를 기록하고 `true`, 쿨다운 중이면 기록 없이 `false`.
    pub async fn try_acquire(
        &self,
        symbol: &str,
        kind: AlertKind,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let key = Self::key(symbol, kind);
        let allowed = self
            .file
            .modify(|ledger: &mut Ledger| {
                if is_allowed(ledger.get(&key), cooldown, now) {
                    ledger.insert(key.clone(), now);
                    (true, true)
                } else {
                    (false, false)
                }
            })
            .await?;

        if allowed {
            debug!(symbol, kind = %kind, "쿨다운 통과");
        } else {
            debug!(symbol, kind = %kind, cooldown_min = cooldown.num_minutes(), "쿨다운 중, 알림 억제");
        }
        Ok(allowed)
    }

    /// 마지막 발송 시각.
    pub async fn last_fired(&self, symbol: &str, kind: AlertKind) -> Result<Option<DateTime<Utc>>> {
        let ledger: Ledger = self.file.read().await?;
        Ok(ledger.get(&Self::key(symbol, kind)).copied())
    }

    /// 전체 기록 수.
    pub async fn len(&self) -> Result<usize> {
        let ledger: Ledger = self.file.read().await?;
        Ok(ledger.len())
    }

    /// `max_age`보다 오래된 기록을 삭제하고 삭제 수를 반환합니다.
    pub async fn prune_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize> {
        let removed = self
            .file
            .modify(|ledger: &mut Ledger| {
                let before = ledger.len();
                ledger.retain(|_, at| now - *at < max_age);
                let removed = before - ledger.len();
                (removed, removed > 0)
            })
            .await?;
        if removed > 0 {
            info!(removed, "오래된 쿨다운 기록 정리");
        }
        Ok(removed)
    }
}

fn is_allowed(last: Option<&DateTime<Utc>>, cooldown: Duration, now: DateTime<Utc>) -> bool {
    match last {
        Some(last) => now - *last >= cooldown,
        None => true,
    }
}
