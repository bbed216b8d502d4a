//! 데이터 Provider 트레이트.
//!
//! 캐시는 시세/과거 데이터를 직접 가져오지 않고 주입된 Provider를 호출합니다.
//! HTTP 구현은 `trader-monitor`에 있고, 테스트는 호출 횟수를 세는 가짜 구현을 씁니다.
//!
//! - `QuoteFetcher`: 심볼 배치 하나의 시세 조회
//! - `HistoricalFetcher`: 심볼 하나의 과거 캔들 시계열 조회

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use trader_core::{HistoricalSeries, HistoryKind, Quote};

/// 배치 시세 조회.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// 심볼 배치의 시세를 조회합니다.
    ///
    /// 응답에 없는 심볼은 결과에서 빠집니다. 배치 전체가 실패하면 `Err`.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>>;
}

/// 과거 캔들 시계열 조회.
#[async_trait]
pub trait HistoricalFetcher: Send + Sync {
    /// 심볼의 `kind` 종류 시계열을 조회합니다.
    async fn fetch_series(&self, symbol: &str, kind: &HistoryKind) -> Result<HistoricalSeries>;
}
