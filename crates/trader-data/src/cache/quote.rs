//! 배치 시세 스냅샷 캐시.
//!
//! 스냅샷은 하나의 캐시 시각을 가진 단위로 유효성을 판단합니다.
//! 여러 모니터 프로세스가 같은 파일을 공유하며, TTL 창마다 한 프로세스만 페치합니다.
//!
//! ```text
//! get_or_fetch(symbols)
//!   │
//!   ├─ shared 락으로 스냅샷 읽기 ── 유효 (TTL 이내 + 요청 심볼 포함) ──▶ 반환
//!   │
//!   ├─ refresh 락 획득 (프로세스 내 Mutex + quotes.refresh.lock)
//!   ├─ 스냅샷 재확인 ── 대기 중 다른 프로세스가 갱신 ──▶ 반환
//!   ├─ ⌈M/B⌉ 배치 페치 (실패한 배치는 해당 심볼만 누락)
//!   └─ exclusive 락으로 스냅샷 교체 후 저장
//! ```
//!
//! 페치 중에는 refresh 락만 잡고 있으므로 유효한 스냅샷을 읽는 쪽은 막히지 않습니다.

use crate::error::{DataError, Result};
use crate::provider::QuoteFetcher;
use crate::storage::{CacheEnvelope, FileLock, LockRetryPolicy, LockedJsonFile};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use trader_core::{CacheConfig, Quote};

/// 스냅샷 파일 이름.
pub const QUOTES_FILE: &str = "quotes.json";
/// 페치 직렬화용 락 파일 이름.
pub const REFRESH_LOCK_FILE: &str = "quotes.refresh.lock";

type Snapshot = CacheEnvelope<Quote>;

/// 시세 캐시 통계.
#[derive(Debug, Default, Clone, Serialize)]
pub struct QuoteCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `fetch_quotes` 호출 수 (배치 수)
    pub fetch_calls: u64,
    pub failed_batches: u64,
    /// 전체 페치 실패로 만료 스냅샷을 반환한 횟수
    pub stale_fallbacks: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_calls: AtomicU64,
    failed_batches: AtomicU64,
    stale_fallbacks: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 공유 시세 캐시.
///
/// 프로세스당 하나를 만들어 `Arc`로 공유합니다.
pub struct QuoteCache {
    store: LockedJsonFile,
    refresh_lock: FileLock,
    /// 같은 프로세스 안의 동시 갱신 직렬화
    refresh_guard: Mutex<()>,
    ttl: Duration,
    stale_grace: Duration,
    counters: Counters,
}

impl QuoteCache {
    /// `dir` 아래 `quotes.json`을 사용하는 캐시 생성.
    pub fn new(dir: impl AsRef<Path>, config: &CacheConfig) -> Self {
        let dir = dir.as_ref();
        let policy = LockRetryPolicy::from(&config.lock);
        Self {
            store: LockedJsonFile::new(dir.join(QUOTES_FILE), policy.clone()),
            refresh_lock: FileLock::new(dir.join(REFRESH_LOCK_FILE), policy),
            refresh_guard: Mutex::new(()),
            ttl: Duration::seconds(config.quote_ttl_secs as i64),
            stale_grace: Duration::seconds(config.quote_stale_grace_secs as i64),
            counters: Counters::default(),
        }
    }

    /// 설정의 캐시 디렉토리로 생성.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.dir, config)
    }

    /// 스냅샷 TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 스냅샷 파일 경로.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// 요청 심볼의 시세를 반환합니다. 스냅샷이 유효하지 않으면 배치로 갱신합니다.
    #[instrument(skip_all, fields(symbols = symbols.len(), batch_size = batch_size))]
    pub async fn get_or_fetch(
        &self,
        symbols: &[String],
        fetcher: &dyn QuoteFetcher,
        batch_size: usize,
    ) -> Result<HashMap<String, Quote>> {
        self.get_or_fetch_at(symbols, fetcher, batch_size, Utc::now())
            .await
    }

    /// `get_or_fetch`와 같지만 현재 시각을 지정합니다.
    pub async fn get_or_fetch_at(
        &self,
        symbols: &[String],
        fetcher: &dyn QuoteFetcher,
        batch_size: usize,
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, Quote>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let requested: BTreeSet<String> = symbols.iter().cloned().collect();

        let snapshot: Snapshot = self.store.read().await?;
        if self.is_valid(&snapshot, &requested, now) {
            Counters::bump(&self.counters.hits);
            debug!(
                age_ms = snapshot.age(now).map(|a| a.num_milliseconds()),
                "시세 캐시 히트"
            );
            return Ok(select(&snapshot.data, &requested));
        }

        let _local = self.refresh_guard.lock().await;
        let _refresh = match self.refresh_lock.exclusive().await {
            Ok(guard) => guard,
            Err(e @ DataError::LockTimeout { .. }) => {
                return self.stale_or(&snapshot, &requested, now, e);
            }
            Err(e) => return Err(e),
        };

        let snapshot: Snapshot = self.store.read().await?;
        if self.is_valid(&snapshot, &requested, now) {
            Counters::bump(&self.counters.hits);
            debug!("대기 중 갱신된 스냅샷 사용");
            return Ok(select(&snapshot.data, &requested));
        }

        Counters::bump(&self.counters.misses);

        // 다른 모니터의 종목이 유효한 동안에는 함께 갱신해 서로 밀어내지 않게 합니다.
        let mut universe = requested.clone();
        if snapshot.is_within(self.ttl, now) {
            universe.extend(snapshot.universe.iter().cloned());
        }

        let batch_size = batch_size.max(1);
        let ordered: Vec<String> = universe.iter().cloned().collect();
        let total_batches = ordered.len().div_ceil(batch_size);

        let mut fetched = BTreeMap::new();
        let mut failed = 0usize;
        let mut last_error = None;
        for (index, batch) in ordered.chunks(batch_size).enumerate() {
            Counters::bump(&self.counters.fetch_calls);
            match fetcher.fetch_quotes(batch).await {
                Ok(quotes) => {
                    debug!(
                        batch = index,
                        requested = batch.len(),
                        received = quotes.len(),
                        "배치 시세 수신"
                    );
                    fetched.extend(
                        quotes
                            .into_iter()
                            .filter(|(symbol, _)| universe.contains(symbol)),
                    );
                }
                Err(e) => {
                    failed += 1;
                    Counters::bump(&self.counters.failed_batches);
                    warn!(batch = index, size = batch.len(), error = %e, "배치 시세 페치 실패, 해당 심볼 제외");
                    last_error = Some(e);
                }
            }
        }

        if failed == total_batches {
            let err = DataError::FetchError(format!(
                "전체 {}개 배치 실패: {}",
                total_batches,
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ));
            return self.stale_or(&snapshot, &requested, now, err);
        }

        let result = select(&fetched, &requested);
        let fresh = Snapshot {
            data: fetched,
            cached_at: Some(now),
            ttl_seconds: self.ttl.num_seconds().max(0) as u64,
            universe,
        };
        self.store.replace(&fresh).await?;

        info!(
            symbols = fresh.data.len(),
            batches = total_batches,
            failed_batches = failed,
            "시세 스냅샷 갱신"
        );
        Ok(result)
    }

    /// 현재 저장된 스냅샷.
    pub async fn snapshot(&self) -> Result<CacheEnvelope<Quote>> {
        self.store.read().await
    }

    /// 캐시 통계.
    pub fn stats(&self) -> QuoteCacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        QuoteCacheStats {
            hits,
            misses,
            fetch_calls: self.counters.fetch_calls.load(Ordering::Relaxed),
            failed_batches: self.counters.failed_batches.load(Ordering::Relaxed),
            stale_fallbacks: self.counters.stale_fallbacks.load(Ordering::Relaxed),
            hit_rate,
        }
    }

    /// TTL 이내이고 요청 심볼을 모두 포함하는 스냅샷인지 확인합니다.
    fn is_valid(&self, snapshot: &Snapshot, requested: &BTreeSet<String>, now: DateTime<Utc>) -> bool {
        snapshot.is_within(self.ttl, now)
            && requested
                .iter()
                .all(|s| snapshot.universe.contains(s) || snapshot.data.contains_key(s))
    }

    /// 유예 시간 이내의 스냅샷이 있으면 반환하고, 없으면 `err`.
    fn stale_or(
        &self,
        snapshot: &Snapshot,
        requested: &BTreeSet<String>,
        now: DateTime<Utc>,
        err: DataError,
    ) -> Result<HashMap<String, Quote>> {
        if !snapshot.data.is_empty() && snapshot.is_within(self.ttl + self.stale_grace, now) {
            Counters::bump(&self.counters.stale_fallbacks);
            warn!(
                age_secs = snapshot.age(now).map(|a| a.num_seconds()),
                error = %err,
                "시세 갱신 실패, 만료된 스냅샷 반환"
            );
            return Ok(select(&snapshot.data, requested));
        }
        Err(err)
    }
}

fn select(data: &BTreeMap<String, Quote>, requested: &BTreeSet<String>) -> HashMap<String, Quote> {
    requested
        .iter()
        .filter_map(|s| data.get(s).map(|q| (s.clone(), q.clone())))
        .collect()
}
