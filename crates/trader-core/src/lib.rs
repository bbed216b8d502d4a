//! # Trader Core
//!
//! 시세 모니터의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 모니터 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시세 스냅샷 및 캔들 시계열
//! - 과거 데이터 종류(HistoryKind) 정의
//! - 알림 종류, 방향, 분류 결과
//! - 설정 관리 (캐시 TTL, 캐스케이드 임계값, 쿨다운)
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
