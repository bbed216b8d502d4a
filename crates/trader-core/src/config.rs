//! 설정 관리.
//!
//! 캐시 TTL, 캐스케이드 임계값/우선순위, 알림 종류별 쿨다운을 한 곳에서 정의합니다.
//! 모든 섹션은 기본값을 가지며 TOML 파일과 `MONITOR__` 환경 변수로 덮어쓸 수 있습니다.

use crate::domain::AlertKind;
use crate::error::{TraderError, TraderResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 캐시 설정
    pub cache: CacheConfig,
    /// 캐스케이드 규칙 설정
    pub cascade: CascadeConfig,
    /// 알림 종류별 쿨다운
    pub cooldown: CooldownConfig,
    /// 모니터 실행 설정
    pub monitor: MonitorSettings,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 캐시 파일 디렉토리 (모든 모니터 프로세스가 공유)
    pub dir: PathBuf,
    /// 시세 스냅샷 TTL (초)
    pub quote_ttl_secs: u64,
    /// 전체 페치 실패 시 만료된 스냅샷을 허용하는 추가 시간 (초)
    pub quote_stale_grace_secs: u64,
    /// 배치당 심볼 수
    pub batch_size: usize,
    /// 과거 데이터 종류별 TTL (초). 키는 종류 키 또는 계열 이름
    pub historical_ttl_secs: HashMap<String, u64>,
    /// 테이블에 없는 종류의 TTL (초)
    pub historical_default_ttl_secs: u64,
    /// 파일 락 재시도 설정
    pub lock: LockConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./cache"),
            quote_ttl_secs: 30,
            quote_stale_grace_secs: 120,
            batch_size: 50,
            historical_ttl_secs: default_historical_ttls(),
            historical_default_ttl_secs: 3600,
            lock: LockConfig::default(),
        }
    }
}

/// 갱신 비용이 큰 종류일수록 TTL이 깁니다.
fn default_historical_ttls() -> HashMap<String, u64> {
    HashMap::from([
        ("daily_30d".to_string(), 6 * 3600),
        ("daily_50d".to_string(), 12 * 3600),
        ("daily_200d".to_string(), 24 * 3600),
        ("intraday".to_string(), 30 * 60),
    ])
}

/// 파일 락 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 대기 (밀리초), 이후 2배씩 증가
    pub base_delay_ms: u64,
    /// 재시도 대기 상한 (밀리초)
    pub max_delay_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 20,
            max_delay_ms: 500,
        }
    }
}

/// 캐스케이드 규칙 하나.
///
/// `volume_multiplier`가 있으면 거래량 확인 규칙입니다.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    /// 이 규칙이 선택하는 알림 종류
    pub kind: AlertKind,
    /// 룩백 (분)
    pub lookback_minutes: i64,
    /// 상승 임계값 (%)
    pub rise_threshold_pct: f64,
    /// 하락 임계값 (%, 절대값)
    pub drop_threshold_pct: f64,
    /// 기준 거래량 대비 배수 조건
    #[serde(default)]
    pub volume_multiplier: Option<f64>,
}

/// 캐스케이드 설정.
///
/// `rules`의 순서가 곧 우선순위입니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// 우선순위 순 규칙 목록
    pub rules: Vec<RuleConfig>,
    /// 기준가 탐색 허용 오차 (초). 틱 간격 흔들림 흡수용
    pub lookback_tolerance_secs: i64,
    /// 기준 거래량 계산에 쓸 일봉 수
    pub baseline_days: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                RuleConfig {
                    kind: AlertKind::VolumeSpike,
                    lookback_minutes: 1,
                    rise_threshold_pct: 1.2,
                    drop_threshold_pct: 1.2,
                    volume_multiplier: Some(2.5),
                },
                RuleConfig {
                    kind: AlertKind::ShortMove,
                    lookback_minutes: 5,
                    rise_threshold_pct: 2.0,
                    drop_threshold_pct: 1.5,
                    volume_multiplier: None,
                },
                RuleConfig {
                    kind: AlertKind::MediumMove,
                    lookback_minutes: 10,
                    rise_threshold_pct: 3.0,
                    drop_threshold_pct: 2.5,
                    volume_multiplier: None,
                },
                RuleConfig {
                    kind: AlertKind::LongMove,
                    lookback_minutes: 30,
                    rise_threshold_pct: 5.0,
                    drop_threshold_pct: 4.0,
                    volume_multiplier: None,
                },
            ],
            lookback_tolerance_secs: 5,
            baseline_days: 20,
        }
    }
}

impl CascadeConfig {
    /// 가장 긴 룩백 (분).
    pub fn max_lookback_minutes(&self) -> i64 {
        self.rules
            .iter()
            .map(|r| r.lookback_minutes)
            .max()
            .unwrap_or(0)
    }
}

/// 알림 종류별 쿨다운 (분).
///
/// 우선순위가 높은 급변 알림은 짧게, 누적 변동 알림은 길게 둡니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub volume_spike_minutes: i64,
    pub short_move_minutes: i64,
    pub medium_move_minutes: i64,
    pub long_move_minutes: i64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            volume_spike_minutes: 10,
            short_move_minutes: 15,
            medium_move_minutes: 20,
            long_move_minutes: 30,
        }
    }
}

impl CooldownConfig {
    /// 알림 종류의 쿨다운 (분).
    pub fn minutes_for(&self, kind: AlertKind) -> i64 {
        match kind {
            AlertKind::VolumeSpike => self.volume_spike_minutes,
            AlertKind::ShortMove => self.short_move_minutes,
            AlertKind::MediumMove => self.medium_move_minutes,
            AlertKind::LongMove => self.long_move_minutes,
        }
    }

    /// 알림 종류의 쿨다운.
    pub fn duration_for(&self, kind: AlertKind) -> chrono::Duration {
        chrono::Duration::minutes(self.minutes_for(kind))
    }
}

/// 모니터 실행 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// 감시 종목 목록
    pub universe: Vec<String>,
    /// 데몬 모드 틱 주기 (초)
    pub interval_secs: u64,
    /// 시세/과거 데이터 HTTP 엔드포인트
    pub fetch_base_url: Option<String>,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 알림 로그(JSON Lines) 경로
    pub alert_log_path: Option<PathBuf>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            universe: Vec::new(),
            interval_secs: 60,
            fetch_base_url: None,
            request_timeout_secs: 10,
            alert_log_path: None,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 기본값 → 파일(선택) → 환경 변수 순으로 설정을 로드하고 검증합니다.
    ///
    /// 환경 변수는 `MONITOR__CACHE__QUOTE_TTL_SECS=15` 형식이며,
    /// `MONITOR__MONITOR__UNIVERSE`는 쉼표로 구분합니다.
    pub fn load(path: Option<&Path>) -> TraderResult<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("MONITOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("monitor.universe"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 값의 범위를 검증합니다.
    pub fn validate(&self) -> TraderResult<()> {
        if self.cache.batch_size == 0 {
            return Err(TraderError::Config("cache.batch_size는 1 이상이어야 합니다".into()));
        }
        if self.cache.quote_ttl_secs == 0 {
            return Err(TraderError::Config("cache.quote_ttl_secs는 1 이상이어야 합니다".into()));
        }
        if self.cache.lock.max_attempts == 0 {
            return Err(TraderError::Config("cache.lock.max_attempts는 1 이상이어야 합니다".into()));
        }
        if self.cascade.rules.is_empty() {
            return Err(TraderError::Config("cascade.rules가 비어 있습니다".into()));
        }

        let mut seen = HashSet::new();
        for rule in &self.cascade.rules {
            if !seen.insert(rule.kind) {
                return Err(TraderError::Config(format!("중복된 규칙: {}", rule.kind)));
            }
            if rule.lookback_minutes <= 0 {
                return Err(TraderError::Config(format!(
                    "{}: lookback_minutes는 양수여야 합니다",
                    rule.kind
                )));
            }
            if rule.rise_threshold_pct <= 0.0 || rule.drop_threshold_pct <= 0.0 {
                return Err(TraderError::Config(format!(
                    "{}: 임계값은 양수여야 합니다",
                    rule.kind
                )));
            }
            if matches!(rule.volume_multiplier, Some(m) if !m.is_finite() || m <= 0.0) {
                return Err(TraderError::Config(format!(
                    "{}: volume_multiplier는 양수여야 합니다",
                    rule.kind
                )));
            }
        }

        let has_volume_rule = self.cascade.rules.iter().any(|r| r.volume_multiplier.is_some());
        if has_volume_rule && self.cascade.baseline_days == 0 {
            return Err(TraderError::Config(
                "cascade.baseline_days는 거래량 규칙이 있을 때 1 이상이어야 합니다".into(),
            ));
        }

        for kind in AlertKind::all() {
            if self.cooldown.minutes_for(kind) < 0 {
                return Err(TraderError::Config(format!("{}: 쿨다운은 음수일 수 없습니다", kind)));
            }
        }

        Ok(())
    }

    /// 틱 실행에 필요한 값(감시 종목, 엔드포인트)이 있는지 확인합니다.
    pub fn validate_runtime(&self) -> TraderResult<()> {
        if self.monitor.universe.is_empty() {
            return Err(TraderError::Config("monitor.universe가 비어 있습니다".into()));
        }
        match self.monitor.fetch_base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(()),
            _ => Err(TraderError::Config("monitor.fetch_base_url이 설정되지 않았습니다".into())),
        }
    }
}
