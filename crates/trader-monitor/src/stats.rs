//! 틱 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use trader_core::AlertClassification;

/// 틱 한 번의 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickStats {
    /// 요청 종목 수
    pub symbols: usize,
    /// 시세를 받은 종목 수
    pub quotes: usize,
    /// 캐스케이드가 알림 종류를 선택한 수
    pub classified: usize,
    /// 쿨다운을 통과해 발송된 수
    pub fired: usize,
    /// 쿨다운으로 억제된 수
    pub suppressed: usize,
    /// 기준 거래량이 없어 거래량 확인 규칙을 건너뛴 종목 수
    pub missing_baseline: usize,
    /// 종목 단위 처리 에러 수
    pub errors: usize,
    /// 전송기 에러 수
    pub sink_errors: usize,
    /// 시세 페치 실패 (스냅샷 없음)
    pub fetch_failed: bool,
    /// 발송된 알림
    pub alerts: Vec<AlertClassification>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl TickStats {
    /// 새 통계 객체 생성
    pub fn new(symbols: usize) -> Self {
        Self {
            symbols,
            ..Default::default()
        }
    }

    /// 시세 수신률 (%)
    pub fn coverage(&self) -> f64 {
        if self.symbols == 0 {
            0.0
        } else {
            (self.quotes as f64 / self.symbols as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            symbols = self.symbols,
            quotes = self.quotes,
            classified = self.classified,
            fired = self.fired,
            suppressed = self.suppressed,
            missing_baseline = self.missing_baseline,
            errors = self.errors,
            sink_errors = self.sink_errors,
            fetch_failed = self.fetch_failed,
            coverage = format!("{:.1}%", self.coverage()),
            elapsed = format!("{:.2}s", self.elapsed.as_secs_f64()),
            "틱 완료"
        );
    }
}
