//! 공유 캐시 모듈.
//!
//! ## QuoteCache
//! - 짧은 TTL의 배치 시세 스냅샷 (`quotes.json`)
//! - 여러 모니터 프로세스가 공유하며 TTL 창마다 한 프로세스만 페치
//!
//! ## HistoricalCache
//! - (심볼, 종류)별 긴 TTL 과거 시계열 (`historical_{kind}.json`)
//! - 만료 엔트리는 읽을 때 삭제

pub mod historical;
pub mod quote;

pub use historical::{HistoricalCache, HistoricalEntry, HistoricalFileStats, HistoricalTtlTable};
pub use quote::{QuoteCache, QuoteCacheStats};
