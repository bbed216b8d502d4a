//! 알림 분류 캐스케이드.
//!
//! 우선순위 순 규칙 목록을 차례로 평가해 처음 일치하는 규칙 하나만 선택합니다.
//! 규칙 순서가 곧 우선순위이며 설정으로 바꿀 수 있습니다.
//!
//! ```text
//! volume_spike (1분, 거래량 ×2.5)
//!     │ 불일치/기준가 없음
//!     ▼
//! short_move (5분) ──▶ medium_move (10분) ──▶ long_move (30분) ──▶ None
//! ```
//!
//! 캐스케이드는 쿨다운 장부를 보지 않습니다. 발송 여부는 호출하는 쪽이 결정합니다.

use crate::window::RollingPriceWindow;
use chrono::Duration;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::trace;
use trader_core::{
    percent_change, AlertClassification, AlertKind, CascadeConfig, DecimalExt, Direction, Quote,
    RuleConfig, TraderError, TraderResult,
};

/// 캐스케이드 규칙 하나.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeRule {
    pub kind: AlertKind,
    pub lookback: Duration,
    /// 상승 임계값 (%)
    pub rise_threshold_pct: Decimal,
    /// 하락 임계값 (%, 절대값)
    pub drop_threshold_pct: Decimal,
    /// 기준 거래량 대비 배수. 있으면 거래량 확인 규칙
    pub volume_multiplier: Option<f64>,
}

impl CascadeRule {
    /// 설정에서 규칙 생성.
    pub fn try_from_config(config: &RuleConfig) -> TraderResult<Self> {
        Ok(Self {
            kind: config.kind,
            lookback: Duration::minutes(config.lookback_minutes),
            rise_threshold_pct: threshold(config.kind, config.rise_threshold_pct)?,
            drop_threshold_pct: threshold(config.kind, config.drop_threshold_pct)?,
            volume_multiplier: config.volume_multiplier,
        })
    }

    /// 방향별 임계값.
    pub fn threshold_for(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Rise => self.rise_threshold_pct,
            Direction::Drop => self.drop_threshold_pct,
        }
    }

    /// 규칙을 평가합니다. 기준가/기준 거래량이 없거나 조건 미달이면 `None`.
    fn apply(
        &self,
        quote: &Quote,
        window: &RollingPriceWindow,
        baseline_volume: Option<f64>,
        tolerance: Duration,
    ) -> Option<AlertClassification> {
        let Some(reference) = window.reference(self.lookback, tolerance, quote.captured_at) else {
            trace!(symbol = %quote.symbol, kind = %self.kind, "기준가 없음, 규칙 건너뜀");
            return None;
        };
        let change = percent_change(reference.price, quote.last)?;

        let direction = Direction::from_change(change);
        let magnitude = change.abs();
        if magnitude < self.threshold_for(direction) {
            return None;
        }

        if let Some(multiplier) = self.volume_multiplier {
            let baseline = baseline_volume.filter(|b| *b > 0.0)?;
            if (quote.volume as f64) < multiplier * baseline {
                trace!(
                    symbol = %quote.symbol,
                    volume = quote.volume,
                    baseline,
                    "거래량 조건 미달"
                );
                return None;
            }
        }

        Some(AlertClassification {
            symbol: quote.symbol.clone(),
            kind: self.kind,
            direction,
            magnitude: magnitude.to_f64_lossy(),
            current_price: quote.last,
            reference_price: reference.price,
            volume: quote.volume,
            avg_volume: baseline_volume,
            lookback_minutes: self.lookback.num_minutes(),
            evaluated_at: quote.captured_at,
        })
    }
}

fn threshold(kind: AlertKind, pct: f64) -> TraderResult<Decimal> {
    Decimal::from_f64(pct)
        .filter(|d| *d > Decimal::ZERO)
        .ok_or_else(|| TraderError::Config(format!("{}: 잘못된 임계값 {}", kind, pct)))
}

/// 우선순위 순 규칙 목록.
#[derive(Debug, Clone)]
pub struct SignalCascade {
    rules: Vec<CascadeRule>,
    tolerance: Duration,
}

impl SignalCascade {
    /// 규칙 목록으로 생성. 목록 순서가 우선순위입니다.
    pub fn new(rules: Vec<CascadeRule>, tolerance: Duration) -> Self {
        Self { rules, tolerance }
    }

    /// 설정에서 생성.
    pub fn from_config(config: &CascadeConfig) -> TraderResult<Self> {
        let rules = config
            .rules
            .iter()
            .map(CascadeRule::try_from_config)
            .collect::<TraderResult<Vec<_>>>()?;
        Ok(Self::new(
            rules,
            Duration::seconds(config.lookback_tolerance_secs),
        ))
    }

    /// 규칙 목록.
    pub fn rules(&self) -> &[CascadeRule] {
        &self.rules
    }

    /// 처음 일치하는 규칙의 분류 결과. 일치하는 규칙이 없으면 `None`.
    pub fn evaluate(
        &self,
        quote: &Quote,
        window: &RollingPriceWindow,
        baseline_volume: Option<f64>,
    ) -> Option<AlertClassification> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(quote, window, baseline_volume, self.tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::PricePoint;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use trader_core::{Price, Volume};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn cascade() -> SignalCascade {
        SignalCascade::from_config(&CascadeConfig::default()).unwrap()
    }

    /// `minutes_ago`분 전 가격들로 윈도우 구성.
    fn window(points: &[(i64, Price)], now: i64) -> RollingPriceWindow {
        let mut window = RollingPriceWindow::new();
        for (minutes_ago, price) in points {
            window.push(PricePoint {
                at: t(now - minutes_ago * 60),
                price: *price,
                volume: 0,
            });
        }
        window
    }

    fn quote(price: Price, volume: Volume, at: i64) -> Quote {
        Quote::new("X", price, volume, t(at))
    }

    #[test]
    fn test_volume_spike_preempts_short_move() {
        // 1분 -1.5%, 5분 -2.0%: 둘 다 만족하지만 거래량 확인 규칙이 우선
        let now = 600;
        let w = window(&[(5, dec!(100.5)), (1, dec!(100))], now);
        let alert = cascade()
            .evaluate(&quote(dec!(98.5), 2_800_000, now), &w, Some(1_000_000.0))
            .unwrap();

        assert_eq!(alert.kind, AlertKind::VolumeSpike);
        assert_eq!(alert.direction, Direction::Drop);
        assert_eq!(alert.magnitude, 1.5);
        assert_eq!(alert.lookback_minutes, 1);
    }

    #[test]
    fn test_falls_through_without_volume_confirmation() {
        let now = 600;
        let w = window(&[(5, dec!(100)), (1, dec!(99.5))], now);
        let alert = cascade()
            .evaluate(&quote(dec!(98), 1_100_000, now), &w, Some(1_000_000.0))
            .unwrap();

        // 5분 -2.0% ≥ 하락 임계값 1.5%
        assert_eq!(alert.kind, AlertKind::ShortMove);
        assert_eq!(alert.reference_price, dec!(100));
    }

    #[test]
    fn test_missing_baseline_skips_volume_rule() {
        let now = 600;
        let w = window(&[(5, dec!(100)), (1, dec!(100))], now);
        let alert = cascade()
            .evaluate(&quote(dec!(98), 5_000_000, now), &w, None)
            .unwrap();
        assert_eq!(alert.kind, AlertKind::ShortMove);
    }

    #[test]
    fn test_rise_and_drop_thresholds_are_independent() {
        // short_move: 상승 2.0%, 하락 1.5%
        let now = 600;
        let w = window(&[(5, dec!(100))], now);
        let c = cascade();

        assert!(c.evaluate(&quote(dec!(101.8), 0, now), &w, None).is_none());
        let drop = c.evaluate(&quote(dec!(98.2), 0, now), &w, None).unwrap();
        assert_eq!(drop.kind, AlertKind::ShortMove);
        assert_eq!(drop.direction, Direction::Drop);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let now = 600;
        let w = window(&[(5, dec!(100))], now);
        let alert = cascade().evaluate(&quote(dec!(102), 0, now), &w, None).unwrap();
        assert_eq!(alert.kind, AlertKind::ShortMove);
        assert_eq!(alert.magnitude, 2.0);
    }

    #[test]
    fn test_long_lookback_when_short_history_is_flat() {
        let now = 3600;
        let w = window(&[(30, dec!(100)), (10, dec!(103)), (5, dec!(104)), (1, dec!(104.5))], now);
        let alert = cascade().evaluate(&quote(dec!(105), 0, now), &w, None).unwrap();
        assert_eq!(alert.kind, AlertKind::LongMove);
        assert_eq!(alert.direction, Direction::Rise);
    }

    #[test]
    fn test_insufficient_history_yields_none() {
        let now = 600;
        let w = window(&[], now);
        assert!(cascade()
            .evaluate(&quote(dec!(50), 9_000_000, now), &w, Some(1.0))
            .is_none());
    }

    #[test]
    fn test_zero_reference_is_skipped() {
        let now = 600;
        let w = window(&[(5, dec!(100)), (1, dec!(0))], now);
        let alert = cascade()
            .evaluate(&quote(dec!(97), 9_000_000, now), &w, Some(1.0))
            .unwrap();
        assert_eq!(alert.kind, AlertKind::ShortMove);
    }

    #[test]
    fn test_overflowing_change_skips_rule() {
        let now = 600;
        let w = window(&[(1, Decimal::new(1, 28))], now);
        assert!(cascade()
            .evaluate(&quote(Decimal::MAX, 9_000_000, now), &w, Some(1.0))
            .is_none());
    }

    #[test]
    fn test_custom_priority_order() {
        let mut config = CascadeConfig::default();
        config.rules.reverse();
        let c = SignalCascade::from_config(&config).unwrap();
        assert_eq!(c.rules()[0].kind, AlertKind::LongMove);

        let now = 3600;
        let w = window(&[(30, dec!(100)), (5, dec!(100))], now);
        let alert = c.evaluate(&quote(dec!(90), 0, now), &w, None).unwrap();
        assert_eq!(alert.kind, AlertKind::LongMove);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = CascadeConfig::default();
        config.rules[0].rise_threshold_pct = f64::NAN;
        assert!(SignalCascade::from_config(&config).is_err());
    }

    proptest! {
        #[test]
        fn test_direction_follows_sign(cents in 300i64..5_000i64) {
            let now = 600;
            let w = window(&[(5, dec!(100))], now);
            let delta = Decimal::new(cents, 2);
            let c = cascade();

            let rise = c.evaluate(&quote(dec!(100) + delta, 0, now), &w, None).unwrap();
            let drop = c.evaluate(&quote(dec!(100) - delta, 0, now), &w, None).unwrap();

            prop_assert_eq!(rise.direction, Direction::Rise);
            prop_assert_eq!(drop.direction, Direction::Drop);
            prop_assert_eq!(rise.kind, drop.kind);
            prop_assert_eq!(rise.magnitude, drop.magnitude);
            prop_assert_eq!(rise.lookback_minutes, drop.lookback_minutes);
        }
    }
}
