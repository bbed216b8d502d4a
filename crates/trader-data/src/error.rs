//! 데이터 모듈 오류 타입.

use std::path::PathBuf;
use thiserror::Error;

/// 캐시/저장소 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 파일 락 획득 실패 (재시도 한도 초과)
    #[error("Lock timeout after {attempts} attempts: {path}")]
    LockTimeout { path: PathBuf, attempts: u32 },

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DataError {
    /// 다음 틱에서 재시도하면 회복될 수 있는 오류인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::Io(_) | DataError::LockTimeout { .. } | DataError::FetchError(_)
        )
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<trader_core::TraderError> for DataError {
    fn from(err: trader_core::TraderError) -> Self {
        match err {
            trader_core::TraderError::Config(msg) => DataError::ConfigError(msg),
            other => DataError::InvalidData(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
