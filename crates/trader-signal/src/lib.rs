//! 시세 변동 알림 판단.
//!
//! 이 crate는 다음을 제공합니다:
//! - 종목별 롤링 가격 윈도우와 영속 가격 히스토리
//! - 우선순위 순 규칙으로 알림 하나를 고르는 캐스케이드
//! - (심볼, 알림 종류)별 영속 쿨다운 장부

pub mod cascade;
pub mod cooldown;
pub mod history;
pub mod window;

pub use cascade::{CascadeRule, SignalCascade};
pub use cooldown::CooldownLedger;
pub use history::PriceHistoryStore;
pub use window::{PricePoint, RollingPriceWindow};
