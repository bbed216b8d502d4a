//! 틱 단위 모니터.
//!
//! ```text
//! QuoteCache.get_or_fetch(universe)
//!   → PriceHistoryStore.record
//!   → 종목별: 기준 거래량(daily_30d) → SignalCascade.evaluate
//!             → CooldownLedger.try_acquire → 알림 전송기
//! ```
//!
//! 어떤 실패도 프로세스를 종료시키지 않습니다. 최악의 경우 해당 틱에서
//! 해당 종목의 알림이 없을 뿐이며 다음 틱에서 회복됩니다.

use crate::error::Result;
use crate::sink::AlertSink;
use crate::stats::TickStats;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use trader_core::{AppConfig, CooldownConfig, HistoryKind, Quote};
use trader_data::{HistoricalCache, HistoricalFetcher, QuoteCache, QuoteFetcher};
use trader_signal::{CooldownLedger, PriceHistoryStore, RollingPriceWindow, SignalCascade};

/// 시세 변동 모니터.
pub struct SignalMonitor {
    quotes: Arc<QuoteCache>,
    historical: Arc<HistoricalCache>,
    history: PriceHistoryStore,
    cascade: SignalCascade,
    ledger: CooldownLedger,
    cooldowns: CooldownConfig,
    quote_fetcher: Arc<dyn QuoteFetcher>,
    historical_fetcher: Option<Arc<dyn HistoricalFetcher>>,
    sinks: Vec<Box<dyn AlertSink>>,
    batch_size: usize,
    baseline_days: usize,
}

impl SignalMonitor {
    /// 설정으로 캐시/장부를 만들고 모니터를 생성합니다.
    pub fn new(config: &AppConfig, quote_fetcher: Arc<dyn QuoteFetcher>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            quotes: Arc::new(QuoteCache::from_config(&config.cache)),
            historical: Arc::new(HistoricalCache::from_config(&config.cache)),
            history: PriceHistoryStore::from_config(&config.cache, &config.cascade),
            cascade: SignalCascade::from_config(&config.cascade)?,
            ledger: CooldownLedger::from_config(&config.cache),
            cooldowns: config.cooldown.clone(),
            quote_fetcher,
            historical_fetcher: None,
            sinks: Vec::new(),
            batch_size: config.cache.batch_size,
            baseline_days: config.cascade.baseline_days,
        })
    }

    /// 기준 거래량 조회용 Provider 설정. 없으면 캐시에 있는 값만 사용합니다.
    pub fn with_historical_fetcher(mut self, fetcher: Arc<dyn HistoricalFetcher>) -> Self {
        self.historical_fetcher = Some(fetcher);
        self
    }

    /// 알림 전송기 추가.
    pub fn with_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// 시세 캐시.
    pub fn quote_cache(&self) -> &Arc<QuoteCache> {
        &self.quotes
    }

    /// 과거 데이터 캐시.
    pub fn historical_cache(&self) -> &Arc<HistoricalCache> {
        &self.historical
    }

    /// 틱 한 번 실행.
    pub async fn tick(&self, universe: &[String]) -> Result<TickStats> {
        self.tick_at(universe, Utc::now()).await
    }

    /// `tick`과 같지만 현재 시각을 지정합니다.
    pub async fn tick_at(&self, universe: &[String], now: DateTime<Utc>) -> Result<TickStats> {
        let start = Instant::now();
        let mut stats = TickStats::new(universe.len());

        let quotes = match self
            .quotes
            .get_or_fetch_at(universe, self.quote_fetcher.as_ref(), self.batch_size, now)
            .await
        {
            Ok(quotes) => quotes,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "시세 조회 실패, 이번 틱 건너뜀");
                stats.fetch_failed = true;
                stats.elapsed = start.elapsed();
                return Ok(stats);
            }
            Err(e) => return Err(e.into()),
        };
        stats.quotes = quotes.len();

        let windows = match self.history.record(&quotes).await {
            Ok(windows) => windows,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "가격 히스토리 기록 실패, 이번 틱 건너뜀");
                stats.errors += 1;
                stats.elapsed = start.elapsed();
                return Ok(stats);
            }
            Err(e) => return Err(e.into()),
        };

        for symbol in universe {
            let (Some(quote), Some(window)) = (quotes.get(symbol), windows.get(symbol)) else {
                continue;
            };
            self.evaluate_symbol(quote, window, now, &mut stats)
                .instrument(trader_core::signal_span!("evaluate", symbol))
                .await;
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }

    async fn evaluate_symbol(
        &self,
        quote: &Quote,
        window: &RollingPriceWindow,
        now: DateTime<Utc>,
        stats: &mut TickStats,
    ) {
        let baseline = self.baseline_volume(&quote.symbol, now).await;
        if baseline.is_none() {
            stats.missing_baseline += 1;
        }

        let Some(alert) = self.cascade.evaluate(quote, window, baseline) else {
            return;
        };
        stats.classified += 1;

        let cooldown = self.cooldowns.duration_for(alert.kind);
        match self
            .ledger
            .try_acquire(&alert.symbol, alert.kind, cooldown, now)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                stats.suppressed += 1;
                return;
            }
            Err(e) => {
                warn!(kind = %alert.kind, error = %e, "쿨다운 장부 접근 실패, 알림 보류");
                stats.errors += 1;
                return;
            }
        }

        info!(
            kind = %alert.kind,
            direction = %alert.direction,
            magnitude = alert.magnitude,
            "알림 선택"
        );
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(&alert).await {
                warn!(sink = sink.name(), error = %e, "알림 전송 실패");
                stats.sink_errors += 1;
            }
        }
        stats.fired += 1;
        stats.alerts.push(alert);
    }

    /// 최근 `baseline_days`일 평균 거래량.
    async fn baseline_volume(&self, symbol: &str, now: DateTime<Utc>) -> Option<f64> {
        let kind = HistoryKind::Daily30;
        let series = match &self.historical_fetcher {
            Some(fetcher) => self
                .historical
                .get_or_fetch_at(symbol, &kind, fetcher.as_ref(), now)
                .await
                .map(Some),
            None => self.historical.get_at(symbol, &kind, now).await,
        };

        match series {
            Ok(series) => series.and_then(|s| s.average_volume(self.baseline_days)),
            Err(e) => {
                warn!(error = %e, "기준 거래량 조회 실패");
                None
            }
        }
    }
}
