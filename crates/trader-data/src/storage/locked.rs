//! 락으로 보호되는 JSON 파일.
//!
//! 읽기는 shared 락, 읽기-수정-쓰기는 exclusive 락 한 번으로 처리합니다.

use super::file_lock::{FileLock, LockRetryPolicy};
use super::json_file::JsonFile;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// `{name}.json` + `{name}.json.lock` 쌍.
#[derive(Debug, Clone)]
pub struct LockedJsonFile {
    file: JsonFile,
    lock: FileLock,
}

impl LockedJsonFile {
    /// 데이터 파일 경로로 생성.
    pub fn new(path: impl Into<PathBuf>, policy: LockRetryPolicy) -> Self {
        let path = path.into();
        let lock = FileLock::for_data_file(&path, policy);
        Self {
            file: JsonFile::new(path),
            lock,
        }
    }

    /// 데이터 파일 경로.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// shared 락 아래에서 읽습니다.
    pub async fn read<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let _guard = self.lock.shared().await?;
        self.file.load().await
    }

    /// exclusive 락 아래에서 파일 전체를 교체합니다.
    pub async fn replace<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let _guard = self.lock.exclusive().await?;
        self.file.save(value).await
    }

    /// exclusive 락 아래에서 읽기-수정-쓰기를 수행합니다.
    ///
    /// 클로저는 `(결과, 저장 여부)`를 반환하며, 변경이 없으면 파일을 다시 쓰지 않습니다.
    pub async fn modify<T, R, F>(&self, f: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> (R, bool),
    {
        let _guard = self.lock.exclusive().await?;
        let mut value: T = self.file.load().await?;
        let (result, dirty) = f(&mut value);
        if dirty {
            self.file.save(&value).await?;
        }
        Ok(result)
    }
}
