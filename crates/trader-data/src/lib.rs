//! 공유 파일 캐시.
//!
//! 이 crate는 다음을 제공합니다:
//! - 프로세스 간 advisory 파일 락과 원자적 JSON 저장소
//! - 짧은 TTL의 배치 시세 캐시 (`QuoteCache`)
//! - (심볼, 종류)별 긴 TTL 과거 데이터 캐시 (`HistoricalCache`)
//! - 캐시가 호출하는 Provider 트레이트

pub mod cache;
pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use cache::{
    HistoricalCache, HistoricalEntry, HistoricalFileStats, HistoricalTtlTable, QuoteCache,
    QuoteCacheStats,
};
pub use provider::{HistoricalFetcher, QuoteFetcher};
pub use storage::{
    CacheEnvelope, FileLock, FileLockGuard, JsonFile, LoadStatus, LockMode, LockRetryPolicy,
    LockedJsonFile,
};
