//! 파일 기반 저장소.
//!
//! - `FileLock`: 프로세스 간 advisory 락 (재시도/백오프)
//! - `JsonFile`: 원자적 JSON 저장, 손상 파일 복구
//! - `LockedJsonFile`: 락 + JSON 파일 조합
//! - `CacheEnvelope`: 캐시 파일 공통 형식

pub mod envelope;
pub mod file_lock;
pub mod json_file;
pub mod locked;

pub use envelope::CacheEnvelope;
pub use file_lock::{FileLock, FileLockGuard, LockMode, LockRetryPolicy};
pub use json_file::{JsonFile, LoadStatus};
pub use locked::LockedJsonFile;
