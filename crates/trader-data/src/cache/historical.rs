//! (심볼, 종류)별 과거 시계열 캐시.
//!
//! 종류마다 별도 파일(`historical_{kind}.json`)에 저장하므로 같은 심볼이라도
//! 종류 간에 데이터가 섞이지 않습니다. 만료된 엔트리는 읽을 때 삭제합니다.
//!
//! TTL 조회 순서: 종류 키(`intraday_5d`) → 계열(`intraday`) → 기본값.

use crate::error::Result;
use crate::provider::HistoricalFetcher;
use crate::storage::{CacheEnvelope, LockRetryPolicy, LockedJsonFile};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use trader_core::{CacheConfig, HistoricalSeries, HistoryKind};

const FILE_PREFIX: &str = "historical_";
const FILE_SUFFIX: &str = ".json";

/// 캐시된 시계열 하나.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEntry {
    /// 저장 시각 (엔트리별 TTL 기준)
    pub cached_at: DateTime<Utc>,
    pub series: HistoricalSeries,
}

type HistoricalFile = CacheEnvelope<HistoricalEntry>;

/// 종류별 TTL 테이블.
#[derive(Debug, Clone)]
pub struct HistoricalTtlTable {
    ttls: HashMap<String, Duration>,
    default: Duration,
}

impl HistoricalTtlTable {
    /// 기본 TTL만 가진 빈 테이블.
    pub fn new(default: Duration) -> Self {
        Self {
            ttls: HashMap::new(),
            default,
        }
    }

    /// 종류 키 또는 계열 이름의 TTL 추가.
    pub fn with_ttl(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.ttls.insert(key.into(), ttl);
        self
    }

    /// 종류의 TTL.
    pub fn ttl_for(&self, kind: &HistoryKind) -> Duration {
        self.ttls
            .get(&kind.key())
            .or_else(|| self.ttls.get(&kind.family()))
            .copied()
            .unwrap_or(self.default)
    }
}

impl From<&CacheConfig> for HistoricalTtlTable {
    fn from(config: &CacheConfig) -> Self {
        config.historical_ttl_secs.iter().fold(
            Self::new(Duration::seconds(config.historical_default_ttl_secs as i64)),
            |table, (key, secs)| table.with_ttl(key.clone(), Duration::seconds(*secs as i64)),
        )
    }
}

impl Default for HistoricalTtlTable {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

/// 종류별 파일 통계.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalFileStats {
    pub kind: String,
    pub path: PathBuf,
    pub entries: usize,
    /// 아직 삭제되지 않은 만료 엔트리 수
    pub expired: usize,
    pub ttl_seconds: u64,
}

/// 과거 시계열 캐시.
pub struct HistoricalCache {
    dir: PathBuf,
    policy: LockRetryPolicy,
    ttls: HistoricalTtlTable,
}

impl HistoricalCache {
    /// `dir` 아래 종류별 파일을 사용하는 캐시 생성.
    pub fn new(dir: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        Self {
            dir: dir.into(),
            policy: LockRetryPolicy::from(&config.lock),
            ttls: HistoricalTtlTable::from(config),
        }
    }

    /// 설정의 캐시 디렉토리로 생성.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.dir.clone(), config)
    }

    /// TTL 테이블 교체.
    pub fn with_ttls(mut self, ttls: HistoricalTtlTable) -> Self {
        self.ttls = ttls;
        self
    }

    /// 종류의 TTL.
    pub fn ttl_for(&self, kind: &HistoryKind) -> Duration {
        self.ttls.ttl_for(kind)
    }

    /// 종류의 파일 경로.
    pub fn path_for(&self, kind: &HistoryKind) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, kind.file_stem(), FILE_SUFFIX))
    }

    fn file_for(&self, kind: &HistoryKind) -> LockedJsonFile {
        LockedJsonFile::new(self.path_for(kind), self.policy.clone())
    }

    /// 유효한 시계열을 조회합니다. 만료된 엔트리는 삭제 후 `None`.
    pub async fn get(&self, symbol: &str, kind: &HistoryKind) -> Result<Option<HistoricalSeries>> {
        self.get_at(symbol, kind, Utc::now()).await
    }

    /// `get`과 같지만 현재 시각을 지정합니다.
    pub async fn get_at(
        &self,
        symbol: &str,
        kind: &HistoryKind,
        now: DateTime<Utc>,
    ) -> Result<Option<HistoricalSeries>> {
        let ttl = self.ttl_for(kind);
        let file = self.file_for(kind);

        let snapshot: HistoricalFile = file.read().await?;
        let Some(entry) = snapshot.data.get(symbol) else {
            debug!(symbol, kind = %kind, "과거 데이터 캐시 미스");
            return Ok(None);
        };
        if now - entry.cached_at < ttl {
            debug!(symbol, kind = %kind, candles = entry.series.len(), "과거 데이터 캐시 히트");
            return Ok(Some(entry.series.clone()));
        }

        // shared 락을 놓은 뒤 exclusive 락으로 다시 확인하고 삭제합니다.
        let current = file
            .modify(|data: &mut HistoricalFile| match data.data.get(symbol) {
                Some(entry) if now - entry.cached_at < ttl => (Some(entry.series.clone()), false),
                Some(_) => {
                    data.data.remove(symbol);
                    (None, true)
                }
                None => (None, false),
            })
            .await?;

        if current.is_none() {
            debug!(symbol, kind = %kind, "만료된 과거 데이터 삭제");
        }
        Ok(current)
    }

    /// 시계열을 저장합니다. 같은 (심볼, 종류)의 기존 엔트리를 교체합니다.
    pub async fn set(&self, symbol: &str, kind: &HistoryKind, series: HistoricalSeries) -> Result<()> {
        self.set_at(symbol, kind, series, Utc::now()).await
    }

    /// `set`과 같지만 저장 시각을 지정합니다.
    pub async fn set_at(
        &self,
        symbol: &str,
        kind: &HistoryKind,
        series: HistoricalSeries,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ttl_seconds = self.ttl_for(kind).num_seconds().max(0) as u64;
        let candles = series.len();

        self.file_for(kind)
            .modify(|data: &mut HistoricalFile| {
                data.ttl_seconds = ttl_seconds;
                data.cached_at = Some(now);
                data.data.insert(
                    symbol.to_string(),
                    HistoricalEntry {
                        cached_at: now,
                        series,
                    },
                );
                ((), true)
            })
            .await?;

        debug!(symbol, kind = %kind, candles, "과거 데이터 저장");
        Ok(())
    }

    /// 캐시에 없으면 Provider에서 가져와 저장합니다.
    #[instrument(skip(self, kind, fetcher), fields(kind = %kind))]
    pub async fn get_or_fetch(
        &self,
        symbol: &str,
        kind: &HistoryKind,
        fetcher: &dyn HistoricalFetcher,
    ) -> Result<HistoricalSeries> {
        self.get_or_fetch_at(symbol, kind, fetcher, Utc::now()).await
    }

    /// `get_or_fetch`와 같지만 현재 시각을 지정합니다.
    pub async fn get_or_fetch_at(
        &self,
        symbol: &str,
        kind: &HistoryKind,
        fetcher: &dyn HistoricalFetcher,
        now: DateTime<Utc>,
    ) -> Result<HistoricalSeries> {
        if let Some(series) = self.get_at(symbol, kind, now).await? {
            return Ok(series);
        }

        let series = fetcher.fetch_series(symbol, kind).await?;
        info!(symbol, kind = %kind, candles = series.len(), "과거 데이터 페치");
        self.set_at(symbol, kind, series.clone(), now).await?;
        Ok(series)
    }

    /// 30일 일봉 조회.
    pub async fn get_daily_30d(&self, symbol: &str) -> Result<Option<HistoricalSeries>> {
        self.get(symbol, &HistoryKind::Daily30).await
    }

    /// 30일 일봉 저장.
    pub async fn set_daily_30d(&self, symbol: &str, series: HistoricalSeries) -> Result<()> {
        self.set(symbol, &HistoryKind::Daily30, series).await
    }

    /// 만료된 엔트리를 삭제하고 삭제 수를 반환합니다.
    ///
    /// `kind`가 `None`이면 디렉토리의 모든 종류 파일을 정리합니다.
    pub async fn clear_expired(&self, kind: Option<&HistoryKind>) -> Result<usize> {
        self.clear_expired_at(kind, Utc::now()).await
    }

    /// `clear_expired`와 같지만 현재 시각을 지정합니다.
    pub async fn clear_expired_at(
        &self,
        kind: Option<&HistoryKind>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let kinds = match kind {
            Some(kind) => vec![kind.clone()],
            None => self.stored_kinds().await?,
        };

        let mut removed = 0;
        for kind in &kinds {
            let ttl = self.ttl_for(kind);
            let count = self
                .file_for(kind)
                .modify(|data: &mut HistoricalFile| {
                    let before = data.data.len();
                    data.data.retain(|_, entry| now - entry.cached_at < ttl);
                    let count = before - data.data.len();
                    (count, count > 0)
                })
                .await?;
            if count > 0 {
                info!(kind = %kind, removed = count, "만료된 과거 데이터 정리");
            }
            removed += count;
        }
        Ok(removed)
    }

    /// 종류별 파일 통계.
    pub async fn stats(&self) -> Result<Vec<HistoricalFileStats>> {
        self.stats_at(Utc::now()).await
    }

    /// `stats`와 같지만 현재 시각을 지정합니다.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<Vec<HistoricalFileStats>> {
        let mut stats = Vec::new();
        for kind in self.stored_kinds().await? {
            let ttl = self.ttl_for(&kind);
            let file = self.file_for(&kind);
            let data: HistoricalFile = file.read().await?;
            stats.push(HistoricalFileStats {
                kind: kind.key(),
                path: file.path().to_path_buf(),
                entries: data.data.len(),
                expired: data
                    .data
                    .values()
                    .filter(|entry| now - entry.cached_at >= ttl)
                    .count(),
                ttl_seconds: ttl.num_seconds().max(0) as u64,
            });
        }
        Ok(stats)
    }

    /// 디렉토리에 파일이 있는 종류 목록 (이름순).
    async fn stored_kinds(&self) -> Result<Vec<HistoryKind>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut kinds = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name
                .to_str()
                .and_then(|n| n.strip_prefix(FILE_PREFIX))
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            match stem.parse::<HistoryKind>() {
                Ok(kind) => kinds.push(kind),
                Err(e) => warn!(file = ?name, error = %e, "알 수 없는 과거 데이터 파일"),
            }
        }
        kinds.sort_by_key(HistoryKind::key);
        Ok(kinds)
    }

    /// 캐시 디렉토리.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
