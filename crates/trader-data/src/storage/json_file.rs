//! JSON 파일 저장소.
//!
//! 락은 호출하는 쪽에서 잡습니다. 이 모듈은 읽기/쓰기만 담당하며,
//! 쓰기는 임시 파일에 기록한 뒤 rename으로 교체하므로 읽는 쪽이
//! 쓰다 만 파일을 보는 일이 없습니다.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 파일 로드 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// 정상 로드
    Loaded,
    /// 파일 없음 (빈 값으로 시작)
    Missing,
    /// 파싱 실패 (빈 값으로 재구성)
    Corrupted,
}

/// 하나의 JSON 파일.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// 새 파일 핸들 생성.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 파일 경로.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 파일을 읽어 역직렬화합니다.
    ///
    /// 파일이 없거나 손상된 경우 기본값을 반환합니다. 손상된 캐시는
    /// 다음 쓰기에서 새로 만들어지므로 오류로 취급하지 않습니다.
    pub async fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load_with_status().await?.0)
    }

    /// `load`와 같지만 로드 상태를 함께 반환합니다.
    pub async fn load_with_status<T>(&self) -> Result<(T, LoadStatus)>
    where
        T: DeserializeOwned + Default,
    {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((T::default(), LoadStatus::Missing));
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            debug!(path = %self.path.display(), "빈 캐시 파일");
            return Ok((T::default(), LoadStatus::Missing));
        }

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok((value, LoadStatus::Loaded)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "손상된 캐시 파일, 빈 캐시로 재구성"
                );
                Ok((T::default(), LoadStatus::Corrupted))
            }
        }
    }

    /// 값을 직렬화해 원자적으로 저장합니다.
    pub async fn save<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "캐시 파일 저장");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp.{}", std::process::id()));
        self.path.with_file_name(name)
    }
}
