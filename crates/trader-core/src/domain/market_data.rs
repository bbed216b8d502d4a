//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Quote` - 배치 시세 스냅샷의 종목별 시세
//! - `Candle` - OHLCV 캔들
//! - `HistoricalSeries` - 시간순 캔들 시계열
//! - `HistoryKind` - 과거 데이터 캐시의 종류 (캔들 수/간격이 다름)

use crate::error::TraderError;
use crate::types::{Price, Volume};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 종목 시세.
///
/// 저장된 이후에는 변경되지 않으며, 새 페치가 스냅샷 전체를 교체합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// 거래소 접두/접미가 포함된 심볼 (예: "005930.KS", "NSE:INFY")
    pub symbol: String,
    /// 최근 체결가
    pub last: Price,
    /// 당일 시가
    pub open: Price,
    /// 당일 고가
    pub high: Price,
    /// 당일 저가
    pub low: Price,
    /// 전일 종가
    pub close: Price,
    /// 당일 누적 거래량
    pub volume: Volume,
    /// 시세 수집 시각
    pub captured_at: DateTime<Utc>,
}

impl Quote {
    /// OHLC를 모두 현재가로 채운 시세를 생성합니다.
    pub fn new(
        symbol: impl Into<String>,
        last: Price,
        volume: Volume,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            last,
            open: last,
            high: last,
            low: last,
            close: last,
            volume,
            captured_at,
        }
    }

    /// 당일 OHLC를 설정합니다.
    pub fn with_ohlc(mut self, open: Price, high: Price, low: Price, close: Price) -> Self {
        self.open = open;
        self.high = high;
        self.low = low;
        self.close = close;
        self
    }
}

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// 캔들 시작 시간 (일봉은 자정 UTC)
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Volume,
}

/// 시간 오름차순 캔들 시계열.
///
/// 누락 구간(휴장일 등)은 허용됩니다. 사용하는 쪽에서 희소한 시계열을 처리해야 합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    candles: Vec<Candle>,
}

impl HistoricalSeries {
    /// 캔들 목록으로 시계열을 생성합니다. 시간순으로 정렬됩니다.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        Self { candles }
    }

    /// 캔들 목록.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// 캔들 수.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// 가장 최근 캔들의 종가.
    pub fn last_close(&self) -> Option<Price> {
        self.candles.last().map(|c| c.close)
    }

    /// 최근 `last_n`개 캔들의 평균 거래량.
    pub fn average_volume(&self, last_n: usize) -> Option<f64> {
        if last_n == 0 || self.candles.is_empty() {
            return None;
        }
        let start = self.candles.len().saturating_sub(last_n);
        let window = &self.candles[start..];
        let total: f64 = window.iter().map(|c| c.volume as f64).sum();
        Some(total / window.len() as f64)
    }
}

/// 과거 데이터 캐시 종류.
///
/// 종류마다 캔들 수/간격이 다르며 같은 심볼이라도 서로 독립적으로 캐시됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HistoryKind {
    /// 최근 30거래일 일봉
    Daily30,
    /// 최근 50거래일 일봉
    Daily50,
    /// 최근 200거래일 일봉
    Daily200,
    /// 최근 N일 분봉
    Intraday { days: u32 },
    /// 기타 종류 (기본 TTL 적용)
    Custom(String),
}

impl HistoryKind {
    /// 캐시 키 문자열.
    pub fn key(&self) -> String {
        match self {
            Self::Daily30 => "daily_30d".to_string(),
            Self::Daily50 => "daily_50d".to_string(),
            Self::Daily200 => "daily_200d".to_string(),
            Self::Intraday { days } => format!("intraday_{}d", days),
            Self::Custom(name) => name.clone(),
        }
    }

    /// TTL 테이블 조회용 계열 이름 (분봉은 일수와 무관하게 "intraday").
    pub fn family(&self) -> String {
        match self {
            Self::Intraday { .. } => "intraday".to_string(),
            other => other.key(),
        }
    }

    /// 파일 이름에 쓸 수 있는 형태의 키.
    pub fn file_stem(&self) -> String {
        self.key()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for HistoryKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Err(TraderError::InvalidInput("빈 HistoryKind".to_string())),
            "daily_30d" => Ok(Self::Daily30),
            "daily_50d" => Ok(Self::Daily50),
            "daily_200d" => Ok(Self::Daily200),
            other => {
                let days = other
                    .strip_prefix("intraday_")
                    .and_then(|rest| rest.strip_suffix('d'))
                    .and_then(|n| n.parse::<u32>().ok());
                Ok(match days {
                    Some(days) => Self::Intraday { days },
                    None => Self::Custom(other.to_string()),
                })
            }
        }
    }
}

impl TryFrom<String> for HistoryKind {
    type Error = TraderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HistoryKind> for String {
    fn from(kind: HistoryKind) -> Self {
        kind.key()
    }
}
