//! 에러 타입 정의.

use thiserror::Error;
use trader_core::TraderError;
use trader_data::DataError;

/// 모니터 에러 타입
#[derive(Debug, Error)]
pub enum MonitorError {
    /// 설정 에러 (프로세스 종료 대상)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 캐시/저장소 에러
    #[error(transparent)]
    Data(#[from] DataError),

    /// HTTP 클라이언트 에러
    #[error("HTTP error: {0}")]
    Http(String),

    /// 알림 전송기 에러
    #[error("Sink error: {0}")]
    Sink(String),
}

impl MonitorError {
    /// 다음 틱에서도 같은 결과가 나오는 설정 에러인지 확인합니다.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Data(DataError::ConfigError(_)))
    }
}

impl From<TraderError> for MonitorError {
    fn from(err: TraderError) -> Self {
        match err {
            TraderError::Config(msg) => Self::Config(msg),
            other => Self::Data(DataError::from(other)),
        }
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        Self::Data(DataError::from(err))
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(DataError::from(err))
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, MonitorError>;
