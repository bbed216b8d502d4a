//! SignalMonitor 통합 테스트
//!
//! 스크립트로 움직이는 가짜 Provider로 틱 전체 흐름을 검증합니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trader_core::{AlertKind, AppConfig, Candle, Direction, HistoricalSeries, HistoryKind, Quote};
use trader_data::{DataError, HistoricalFetcher, QuoteFetcher, Result};
use trader_monitor::{JsonlAlertLog, SignalMonitor, TracingAlertSink};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// 테스트용 시장. 현재 가격/거래량/시각을 바꿔가며 틱을 실행합니다.
#[derive(Default)]
struct ScriptedMarket {
    prices: Mutex<HashMap<String, (Decimal, u64)>>,
    at: Mutex<Option<DateTime<Utc>>>,
    calls: AtomicUsize,
    down: AtomicBool,
}

impl ScriptedMarket {
    fn set(&self, symbol: &str, price: Decimal, volume: u64, at: DateTime<Utc>) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), (price, volume));
        *self.at.lock().unwrap() = Some(at);
    }
}

#[async_trait]
impl QuoteFetcher for ScriptedMarket {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(DataError::FetchError("connection refused".into()));
        }

        let at = self.at.lock().unwrap().unwrap_or_else(|| t(0));
        let prices = self.prices.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| {
                prices
                    .get(s)
                    .map(|(price, volume)| (s.clone(), Quote::new(s.clone(), *price, *volume, at)))
            })
            .collect())
    }
}

#[async_trait]
impl HistoricalFetcher for ScriptedMarket {
    async fn fetch_series(&self, _symbol: &str, kind: &HistoryKind) -> Result<HistoricalSeries> {
        assert_eq!(kind, &HistoryKind::Daily30);
        Ok(HistoricalSeries::new(
            (1..=20)
                .map(|d| Candle {
                    open_time: Utc.with_ymd_and_hms(2026, 9, d, 0, 0, 0).unwrap(),
                    open: dec!(100),
                    high: dec!(100),
                    low: dec!(100),
                    close: dec!(100),
                    volume: 1_000_000,
                })
                .collect(),
        ))
    }
}

fn config(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.cache.dir = dir.to_path_buf();
    config.monitor.universe = vec!["X".to_string()];
    config
}

#[tokio::test]
async fn test_volume_spike_fires_once_then_cooldown_suppresses() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Arc::new(ScriptedMarket::default());
    let log = JsonlAlertLog::new(dir.path().join("alerts.jsonl"));
    let log_path = log.path().to_path_buf();

    let monitor = SignalMonitor::new(&config, market.clone())
        .unwrap()
        .with_historical_fetcher(market.clone())
        .with_sink(TracingAlertSink)
        .with_sink(log);
    let universe = config.monitor.universe.clone();

    market.set("X", dec!(100), 1_000_000, t(0));
    let stats = monitor.tick_at(&universe, t(0)).await.unwrap();
    assert_eq!(stats.quotes, 1);
    assert_eq!(stats.classified, 0);

    market.set("X", dec!(98.5), 2_800_000, t(1));
    let stats = monitor.tick_at(&universe, t(1)).await.unwrap();
    assert_eq!(stats.fired, 1);
    let alert = &stats.alerts[0];
    assert_eq!(alert.kind, AlertKind::VolumeSpike);
    assert_eq!(alert.direction, Direction::Drop);
    assert_eq!(alert.magnitude, 1.5);
    assert_eq!(alert.avg_volume, Some(1_000_000.0));

    market.set("X", dec!(97.2), 5_600_000, t(2));
    let stats = monitor.tick_at(&universe, t(2)).await.unwrap();
    assert_eq!(stats.classified, 1);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(stats.fired, 0);

    let logged = JsonlAlertLog::new(log_path).read_all().await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].kind, AlertKind::VolumeSpike);
}

#[tokio::test]
async fn test_fetch_failure_completes_tick() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Arc::new(ScriptedMarket::default());
    market.down.store(true, Ordering::SeqCst);

    let monitor = SignalMonitor::new(&config, market.clone()).unwrap();
    let stats = monitor
        .tick_at(&config.monitor.universe, t(0))
        .await
        .unwrap();

    assert!(stats.fetch_failed);
    assert_eq!(stats.quotes, 0);
    assert!(stats.alerts.is_empty());
}

#[tokio::test]
async fn test_monitors_share_one_fetch_per_ttl_window() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Arc::new(ScriptedMarket::default());
    market.set("X", dec!(100), 1_000_000, t(0));

    // 별도 프로세스처럼 각자 캐시 인스턴스를 가진 모니터 두 개
    let first = SignalMonitor::new(&config, market.clone()).unwrap();
    let second = SignalMonitor::new(&config, market.clone()).unwrap();

    first.tick_at(&config.monitor.universe, t(0)).await.unwrap();
    second
        .tick_at(&config.monitor.universe, t(0) + Duration::seconds(10))
        .await
        .unwrap();

    assert_eq!(market.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_without_baseline_volume_rule_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Arc::new(ScriptedMarket::default());

    // 과거 데이터 Provider 없음 → 기준 거래량 없음
    let monitor = SignalMonitor::new(&config, market.clone()).unwrap();
    let universe = config.monitor.universe.clone();

    market.set("X", dec!(100), 1_000_000, t(0));
    monitor.tick_at(&universe, t(0)).await.unwrap();

    // 1분 -1.5%지만 거래량 확인 불가, 5분 기준가도 아직 없음
    market.set("X", dec!(98.5), 2_800_000, t(1));
    let stats = monitor.tick_at(&universe, t(1)).await.unwrap();
    assert_eq!(stats.missing_baseline, 1);
    assert_eq!(stats.classified, 0);
}
