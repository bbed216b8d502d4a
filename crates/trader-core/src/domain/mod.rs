//! 시세 모니터링을 위한 도메인 모델.

mod alert;
mod market_data;

pub use alert::*;
pub use market_data::*;
