//! 시세 변동 모니터.
//!
//! 이 crate는 공유 캐시와 알림 캐스케이드를 묶는 얇은 실행 계층을 제공합니다:
//! - 틱 단위 오케스트레이션 (`SignalMonitor`)
//! - HTTP 시세/과거 데이터 Provider
//! - 알림 전송기 (구조화 로그, JSON Lines 로그)
//! - 틱 통계

pub mod error;
pub mod fetcher;
pub mod monitor;
pub mod sink;
pub mod stats;

pub use error::{MonitorError, Result};
pub use fetcher::HttpQuoteFetcher;
pub use monitor::SignalMonitor;
pub use sink::{AlertSink, JsonlAlertLog, TracingAlertSink};
pub use stats::TickStats;
