//! 시세 변동 모니터 CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use trader_core::{init_logging, AppConfig, HistoryKind, LogConfig};
use trader_data::{HistoricalCache, QuoteCache};
use trader_monitor::{HttpQuoteFetcher, JsonlAlertLog, SignalMonitor, TracingAlertSink};
use trader_signal::{CooldownLedger, PriceHistoryStore};

#[derive(Parser)]
#[command(name = "signal-monitor")]
#[command(about = "Shared-cache price move monitor", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 틱 한 번 실행
    Tick {
        /// 감시 종목 (쉼표로 구분, 예: "AAPL,NSE:INFY"). 없으면 설정값 사용
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 데몬 모드: 주기적으로 틱 실행
    Daemon,

    /// 만료된 과거 데이터 정리
    ClearExpired {
        /// 특정 종류만 정리 (예: "daily_30d", "intraday_5d")
        #[arg(long)]
        kind: Option<String>,
    },

    /// 캐시/장부 상태 출력
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!(cache_dir = %config.cache.dir.display(), "Signal Monitor 시작");

    match cli.command {
        Commands::Tick { symbols } => {
            if let Some(symbols) = symbols {
                config.monitor.universe = parse_symbols(&symbols);
            }
            let monitor = build_monitor(&config)?;
            let stats = monitor.tick(&config.monitor.universe).await?;
            stats.log_summary();
        }
        Commands::Daemon => {
            let monitor = build_monitor(&config)?;
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}초, 종목: {}개) ===",
                config.monitor.interval_secs,
                config.monitor.universe.len()
            );

            let mut interval =
                tokio::time::interval(Duration::from_secs(config.monitor.interval_secs.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        match monitor.tick(&config.monitor.universe).await {
                            Ok(stats) => stats.log_summary(),
                            Err(e) if e.is_config() => return Err(e).context("설정 오류로 데몬 종료"),
                            Err(e) => tracing::error!("틱 실패: {}", e),
                        }
                    }
                }
            }
        }
        Commands::ClearExpired { kind } => {
            let kind = kind
                .map(|k| k.parse::<HistoryKind>())
                .transpose()
                .context("잘못된 종류")?;
            let cache = HistoricalCache::from_config(&config.cache);
            let removed = cache.clear_expired(kind.as_ref()).await?;
            tracing::info!(removed, "만료된 과거 데이터 정리 완료");
            println!("{}", removed);
        }
        Commands::Stats => {
            let quotes = QuoteCache::from_config(&config.cache);
            let snapshot = quotes.snapshot().await?;
            let historical = HistoricalCache::from_config(&config.cache).stats().await?;
            let cooldowns = CooldownLedger::from_config(&config.cache).len().await?;
            let history = PriceHistoryStore::from_config(&config.cache, &config.cascade)
                .symbol_count()
                .await?;

            let report = json!({
                "quotes": {
                    "symbols": snapshot.data.len(),
                    "cachedAt": snapshot.cached_at,
                    "ageSeconds": snapshot.age(chrono::Utc::now()).map(|a| a.num_seconds()),
                    "ttlSeconds": quotes.ttl().num_seconds(),
                },
                "historical": historical,
                "cooldownRecords": cooldowns,
                "priceHistorySymbols": history,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    tracing::info!("Signal Monitor 종료");
    Ok(())
}

/// 설정으로 모니터를 구성합니다. 감시 종목/엔드포인트가 없으면 에러.
fn build_monitor(config: &AppConfig) -> anyhow::Result<SignalMonitor> {
    config.validate_runtime().context("실행 설정 오류")?;

    let base_url = config.monitor.fetch_base_url.clone().unwrap_or_default();
    let fetcher = Arc::new(HttpQuoteFetcher::new(
        base_url,
        Duration::from_secs(config.monitor.request_timeout_secs),
    )?);

    let mut monitor = SignalMonitor::new(config, fetcher.clone())?
        .with_historical_fetcher(fetcher)
        .with_sink(TracingAlertSink);
    if let Some(path) = &config.monitor.alert_log_path {
        monitor = monitor.with_sink(JsonlAlertLog::new(path.clone()));
    }
    Ok(monitor)
}

fn parse_symbols(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
