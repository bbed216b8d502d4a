//! 종목별 롤링 가격 윈도우.
//!
//! "K분 전 가격" 질의에 답하기 위해 최근 시세 포인트를 시간순으로 보관합니다.
//! 틱 간격이 정확히 1분이 아니므로 기준가 탐색에 허용 오차를 둡니다.
//!
//! ```text
//!   now - 2L        now - L + tol     now
//!      |─────── 기준가 후보 ───────|      |
//!                 가장 최근 포인트 선택
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trader_core::{Price, Quote, Volume};

/// 시세 포인트 하나.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub at: DateTime<Utc>,
    pub price: Price,
    pub volume: Volume,
}

impl From<&Quote> for PricePoint {
    fn from(quote: &Quote) -> Self {
        Self {
            at: quote.captured_at,
            price: quote.last,
            volume: quote.volume,
        }
    }
}

/// 시간 오름차순 가격 윈도우. 타임스탬프는 엄격히 증가합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingPriceWindow {
    points: VecDeque<PricePoint>,
}

impl RollingPriceWindow {
    /// 빈 윈도우.
    pub fn new() -> Self {
        Self::default()
    }

    /// 포인트 추가. 마지막 포인트보다 이르거나 같은 시각이면 무시하고 `false`.
    pub fn push(&mut self, point: PricePoint) -> bool {
        if self.points.back().is_some_and(|last| point.at <= last.at) {
            return false;
        }
        self.points.push_back(point);
        true
    }

    /// 시세를 포인트로 추가.
    pub fn push_quote(&mut self, quote: &Quote) -> bool {
        self.push(PricePoint::from(quote))
    }

    /// `lookback` 전 기준 포인트.
    ///
    /// `now - lookback + tolerance` 이전의 가장 최근 포인트를 고르되,
    /// `now - 2 * lookback`보다 오래된 포인트는 기준으로 쓰지 않습니다.
    pub fn reference(
        &self,
        lookback: Duration,
        tolerance: Duration,
        now: DateTime<Utc>,
    ) -> Option<&PricePoint> {
        let latest_allowed = now - lookback + tolerance;
        let oldest_allowed = now - lookback - lookback;

        self.points
            .iter()
            .rev()
            .find(|p| p.at < now && p.at <= latest_allowed)
            .filter(|p| p.at >= oldest_allowed)
    }

    /// `cutoff`보다 오래된 포인트를 제거하고 제거 수를 반환합니다.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while self.points.front().is_some_and(|p| p.at < cutoff) {
            self.points.pop_front();
            removed += 1;
        }
        removed
    }

    /// 가장 최근 포인트 기준 `span`보다 오래된 포인트 제거.
    pub fn retain_span(&mut self, span: Duration) -> usize {
        match self.latest() {
            Some(latest) => {
                let cutoff = latest.at - span;
                self.evict_before(cutoff)
            }
            None => 0,
        }
    }

    /// 가장 최근 포인트.
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// 시간순 포인트.
    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn point(secs: i64, price: Price) -> PricePoint {
        PricePoint {
            at: t(secs),
            price,
            volume: 0,
        }
    }

    #[test]
    fn test_push_rejects_non_increasing() {
        let mut window = RollingPriceWindow::new();
        assert!(window.push(point(0, dec!(100))));
        assert!(!window.push(point(0, dec!(101))));
        assert!(!window.push(point(-5, dec!(99))));
        assert!(window.push(point(60, dec!(101))));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_reference_tolerates_tick_jitter() {
        let mut window = RollingPriceWindow::new();
        window.push(point(0, dec!(100)));
        window.push(point(62, dec!(101)));

        // 1분 룩백, 5초 허용: 62초 시점에 0초 포인트가 기준
        let tol = Duration::seconds(5);
        let reference = window.reference(Duration::minutes(1), tol, t(62)).unwrap();
        assert_eq!(reference.price, dec!(100));

        // 57초 시점에도 허용 오차 안이므로 0초 포인트
        assert!(window.reference(Duration::minutes(1), tol, t(57)).is_some());
        // 50초 시점에는 아직 1분 전 포인트가 없음
        assert!(window.reference(Duration::minutes(1), tol, t(50)).is_none());
    }

    #[test]
    fn test_reference_ignores_too_old_points() {
        let mut window = RollingPriceWindow::new();
        window.push(point(0, dec!(100)));

        // 5분 룩백인데 유일한 포인트가 11분 전이면 기준 없음
        let reference = window.reference(Duration::minutes(5), Duration::seconds(5), t(660));
        assert!(reference.is_none());
        assert!(window
            .reference(Duration::minutes(5), Duration::seconds(5), t(540))
            .is_some());
    }

    #[test]
    fn test_reference_picks_most_recent_candidate() {
        let mut window = RollingPriceWindow::new();
        for (secs, price) in [(0, dec!(100)), (60, dec!(101)), (120, dec!(102)), (180, dec!(103))] {
            window.push(point(secs, price));
        }

        let reference = window
            .reference(Duration::minutes(1), Duration::seconds(5), t(180))
            .unwrap();
        assert_eq!(reference.price, dec!(102));
    }

    #[test]
    fn test_retain_span_evicts_oldest() {
        let mut window = RollingPriceWindow::new();
        for minute in 0..10 {
            window.push(point(minute * 60, dec!(100)));
        }

        let removed = window.retain_span(Duration::minutes(3));
        assert_eq!(removed, 6);
        assert_eq!(window.points().next().unwrap().at, t(6 * 60));
    }

    #[test]
    fn test_serialized_shape() {
        let mut window = RollingPriceWindow::new();
        window.push(point(0, dec!(100.5)));
        let json = serde_json::to_value(&window).unwrap();
        assert_eq!(json["points"][0]["price"], "100.5");
    }
}
