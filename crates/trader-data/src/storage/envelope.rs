//! 캐시 파일 공통 봉투(envelope).
//!
//! 파일 안의 형태는 `{data, cachedAt, ttlSeconds}`로 통일하고,
//! 페이로드(`T`)는 캐시 종류별 구조체를 그대로 사용합니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 캐시 파일 봉투.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(deserialize = "T: serde::de::DeserializeOwned")
)]
pub struct CacheEnvelope<T> {
    /// 키 → 페이로드
    #[serde(default)]
    pub data: BTreeMap<String, T>,
    /// 파일 단위 캐시 시각 (엔트리 단위 시각은 페이로드에 포함)
    #[serde(default)]
    pub cached_at: Option<DateTime<Utc>>,
    /// 이 파일에 적용되는 TTL (초)
    #[serde(default)]
    pub ttl_seconds: u64,
    /// 스냅샷을 만들 때 요청된 키 집합 (스냅샷 단위 캐시에서만 사용)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub universe: BTreeSet<String>,
}

impl<T> Default for CacheEnvelope<T> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
            cached_at: None,
            ttl_seconds: 0,
            universe: BTreeSet::new(),
        }
    }
}

impl<T> CacheEnvelope<T> {
    /// 빈 봉투 생성.
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            ..Default::default()
        }
    }

    /// 파일 단위 캐시 나이. 캐시 시각이 없으면 `None`.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.cached_at.map(|at| now - at)
    }

    /// 파일 단위로 `ttl` 이내인지 확인합니다.
    ///
    /// 캐시 시각이 미래(다른 호스트와의 시계 오차)인 경우에도 유효로 봅니다.
    pub fn is_within(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now).is_some_and(|age| age < ttl)
    }
}
