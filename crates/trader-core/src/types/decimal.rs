//! 정밀한 가격 계산을 위한 Decimal 유틸리티.
//!
//! 가격은 `Decimal`로 보관하고, 변동률처럼 임계값과 비교하는 값만
//! `f64`로 변환합니다.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 누적 거래량 타입 (주 단위).
pub type Volume = u64;

/// 기준가 대비 현재가의 변동률(%)을 계산합니다.
///
/// 기준가가 0 이하이거나 연산이 Decimal 범위를 넘으면 `None`을 반환합니다.
pub fn percent_change(reference: Price, current: Price) -> Option<Decimal> {
    if reference <= Decimal::ZERO {
        return None;
    }
    current
        .checked_sub(reference)?
        .checked_div(reference)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 임계값 비교용 f64로 변환합니다. 표현 범위를 벗어나면 0을 반환합니다.
    fn to_f64_lossy(&self) -> f64;
}

impl DecimalExt for Decimal {
    fn to_f64_lossy(&self) -> f64 {
        self.to_f64().unwrap_or_default()
    }
}
