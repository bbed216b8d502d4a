//! 알림 종류와 분류 결과 정의.
//!
//! 캐스케이드가 선택한 알림 종류와, 알림 전송기/로거에 넘겨지는
//! 분류 결과를 정의합니다.

use crate::error::TraderError;
use crate::types::{Price, Volume};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 알림 종류.
///
/// 우선순위는 여기서 정하지 않고 캐스케이드 규칙 목록의 순서로 정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// 거래량이 동반된 급변동
    VolumeSpike,
    /// 단기 룩백 변동
    ShortMove,
    /// 중기 룩백 누적 변동
    MediumMove,
    /// 장기 룩백 누적 변동
    LongMove,
}

impl AlertKind {
    /// 모든 알림 종류.
    pub fn all() -> [AlertKind; 4] {
        [
            AlertKind::VolumeSpike,
            AlertKind::ShortMove,
            AlertKind::MediumMove,
            AlertKind::LongMove,
        ]
    }

    /// 문자열 키.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::VolumeSpike => "volume_spike",
            AlertKind::ShortMove => "short_move",
            AlertKind::MediumMove => "medium_move",
            AlertKind::LongMove => "long_move",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TraderError::InvalidInput(format!("알 수 없는 알림 종류: {}", s)))
    }
}

/// 가격 변동 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 상승
    Rise,
    /// 하락
    Drop,
}

impl Direction {
    /// 변동률 부호로 방향을 결정합니다. 0은 상승으로 취급합니다.
    pub fn from_change(change_pct: Decimal) -> Self {
        if change_pct.is_sign_negative() && !change_pct.is_zero() {
            Direction::Drop
        } else {
            Direction::Rise
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rise => write!(f, "rise"),
            Direction::Drop => write!(f, "drop"),
        }
    }
}

/// 캐스케이드 분류 결과.
///
/// 쿨다운 통과 후 알림 전송기와 로거에 그대로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertClassification {
    /// 심볼
    pub symbol: String,
    /// 알림 종류
    pub kind: AlertKind,
    /// 방향
    pub direction: Direction,
    /// 변동률 절대값 (%)
    pub magnitude: f64,
    /// 현재가
    pub current_price: Price,
    /// 룩백 기준가
    pub reference_price: Price,
    /// 현재 누적 거래량
    pub volume: Volume,
    /// 기준 거래량 (평균)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_volume: Option<f64>,
    /// 비교에 사용한 룩백 (분)
    pub lookback_minutes: i64,
    /// 평가 시각 (시세 수집 시각)
    pub evaluated_at: DateTime<Utc>,
}

impl AlertClassification {
    /// 부호가 포함된 변동률 (%).
    pub fn signed_change(&self) -> f64 {
        match self.direction {
            Direction::Rise => self.magnitude,
            Direction::Drop => -self.magnitude,
        }
    }

    /// 기준 거래량 대비 배수.
    pub fn volume_ratio(&self) -> Option<f64> {
        self.avg_volume
            .filter(|avg| *avg > 0.0)
            .map(|avg| self.volume as f64 / avg)
    }
}
