//! 영속 가격 히스토리.
//!
//! 종목별 `RollingPriceWindow`를 `price_history.json`에 보관해 여러 모니터 프로세스와
//! 재시작 이후에도 같은 룩백 기준가를 사용합니다. 같은 스냅샷을 두 프로세스가 기록해도
//! 타임스탬프가 증가하지 않는 포인트는 무시되므로 중복되지 않습니다.

use crate::window::RollingPriceWindow;
use chrono::Duration;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;
use trader_core::{CacheConfig, CascadeConfig, Quote};
use trader_data::{LockRetryPolicy, LockedJsonFile, Result};

/// 히스토리 파일 이름.
pub const PRICE_HISTORY_FILE: &str = "price_history.json";

type Windows = BTreeMap<String, RollingPriceWindow>;

/// 종목별 가격 윈도우 저장소.
pub struct PriceHistoryStore {
    file: LockedJsonFile,
    /// 가장 최근 포인트 기준 보관 구간
    retention: Duration,
}

impl PriceHistoryStore {
    /// `dir` 아래 `price_history.json`을 사용하는 저장소 생성.
    pub fn new(dir: impl AsRef<Path>, policy: LockRetryPolicy, retention: Duration) -> Self {
        Self {
            file: LockedJsonFile::new(dir.as_ref().join(PRICE_HISTORY_FILE), policy),
            retention,
        }
    }

    /// 설정에서 생성. 보관 구간은 어떤 룩백도 참조할 수 없게 되는 시점까지입니다.
    pub fn from_config(cache: &CacheConfig, cascade: &CascadeConfig) -> Self {
        Self::new(
            &cache.dir,
            LockRetryPolicy::from(&cache.lock),
            retention_for(cascade),
        )
    }

    /// 보관 구간.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// 시세를 기록하고 해당 종목들의 갱신된 윈도우를 반환합니다.
    pub async fn record(
        &self,
        quotes: &HashMap<String, Quote>,
    ) -> Result<HashMap<String, RollingPriceWindow>> {
        let retention = self.retention;
        let newest = quotes.values().map(|q| q.captured_at).max();
        let (windows, appended, evicted, dropped) = self
            .file
            .modify(|stored: &mut Windows| {
                let mut appended = 0usize;
                let mut evicted = 0usize;
                let mut windows = HashMap::with_capacity(quotes.len());

                for (symbol, quote) in quotes {
                    let window = stored.entry(symbol.clone()).or_default();
                    if window.push_quote(quote) {
                        appended += 1;
                    }
                    evicted += window.retain_span(retention);
                    windows.insert(symbol.clone(), window.clone());
                }

                // 유니버스에서 빠져 보관 구간 밖으로 밀려난 종목 제거
                let before = stored.len();
                if let Some(newest) = newest {
                    let cutoff = newest - retention;
                    stored.retain(|_, w| w.latest().is_some_and(|p| p.at >= cutoff));
                }
                let dropped = before - stored.len();

                let dirty = appended > 0 || evicted > 0 || dropped > 0;
                ((windows, appended, evicted, dropped), dirty)
            })
            .await?;

        debug!(symbols = quotes.len(), appended, evicted, dropped, "가격 히스토리 기록");
        Ok(windows)
    }

    /// 종목의 윈도우. 기록이 없으면 빈 윈도우.
    pub async fn window(&self, symbol: &str) -> Result<RollingPriceWindow> {
        let stored: Windows = self.file.read().await?;
        Ok(stored.get(symbol).cloned().unwrap_or_default())
    }

    /// 기록된 종목 수.
    pub async fn symbol_count(&self) -> Result<usize> {
        let stored: Windows = self.file.read().await?;
        Ok(stored.len())
    }
}

/// 가장 긴 룩백의 두 배 + 허용 오차.
pub fn retention_for(cascade: &CascadeConfig) -> Duration {
    Duration::minutes(cascade.max_lookback_minutes() * 2)
        + Duration::seconds(cascade.lookback_tolerance_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn snapshot(minute: i64) -> HashMap<String, Quote> {
        HashMap::from([(
            "AAPL".to_string(),
            Quote::new("AAPL", dec!(100) + rust_decimal::Decimal::from(minute), 1_000, t(minute)),
        )])
    }

    #[test]
    fn test_default_retention() {
        // 최장 룩백 30분
        assert_eq!(
            retention_for(&CascadeConfig::default()),
            Duration::minutes(60) + Duration::seconds(5)
        );
    }

    #[tokio::test]
    async fn test_record_deduplicates_same_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceHistoryStore::new(dir.path(), LockRetryPolicy::default(), Duration::hours(1));

        store.record(&snapshot(0)).await.unwrap();
        // 두 번째 프로세스가 같은 스냅샷을 기록
        let other = PriceHistoryStore::new(dir.path(), LockRetryPolicy::default(), Duration::hours(1));
        let windows = other.record(&snapshot(0)).await.unwrap();

        assert_eq!(windows["AAPL"].len(), 1);
    }

    #[tokio::test]
    async fn test_record_evicts_beyond_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceHistoryStore::new(dir.path(), LockRetryPolicy::default(), Duration::minutes(10));

        for minute in 0..=20 {
            store.record(&snapshot(minute)).await.unwrap();
        }

        let window = store.window("AAPL").await.unwrap();
        assert_eq!(window.len(), 11);
        assert_eq!(window.points().next().unwrap().at, t(10));
        assert_eq!(store.symbol_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_drops_symbols_that_left_universe() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceHistoryStore::new(dir.path(), LockRetryPolicy::default(), Duration::minutes(10));

        let mut first = snapshot(0);
        first.insert("MSFT".to_string(), Quote::new("MSFT", dec!(400), 500, t(0)));
        store.record(&first).await.unwrap();
        assert_eq!(store.symbol_count().await.unwrap(), 2);

        // MSFT는 구간 안이면 유지
        store.record(&snapshot(10)).await.unwrap();
        assert_eq!(store.symbol_count().await.unwrap(), 2);

        store.record(&snapshot(11)).await.unwrap();
        assert_eq!(store.symbol_count().await.unwrap(), 1);
        assert!(store.window("MSFT").await.unwrap().is_empty());
        assert_eq!(store.window("AAPL").await.unwrap().len(), 2);
    }
}
