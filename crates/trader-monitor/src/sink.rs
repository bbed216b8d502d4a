//! 알림 전송기.
//!
//! 쿨다운을 통과한 분류 결과를 틱 안에서 동기적으로 전달합니다.
//! 전송기 실패는 집계만 하고 틱을 중단하지 않습니다.

use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use trader_core::AlertClassification;

/// 알림 전송기 트레이트.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// 로그용 이름.
    fn name(&self) -> &str;

    /// 알림 하나를 전달합니다.
    async fn deliver(&self, alert: &AlertClassification) -> Result<()>;
}

/// 구조화 로그로 알림을 남기는 전송기.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn deliver(&self, alert: &AlertClassification) -> Result<()> {
        tracing::info!(
            symbol = %alert.symbol,
            kind = %alert.kind,
            direction = %alert.direction,
            magnitude = alert.magnitude,
            current = %alert.current_price,
            reference = %alert.reference_price,
            volume = alert.volume,
            volume_ratio = ?alert.volume_ratio(),
            lookback_min = alert.lookback_minutes,
            change = format!("{:+.2}%", alert.signed_change()),
            "알림 발송"
        );
        Ok(())
    }
}

/// JSON Lines 알림 로그.
///
/// 한 줄에 알림 하나를 append 모드로 기록합니다.
#[derive(Debug)]
pub struct JsonlAlertLog {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl JsonlAlertLog {
    /// 새 로그 생성. 파일은 첫 기록 시 만들어집니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Mutex::new(()),
        }
    }

    /// 로그 파일 경로.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 기록된 알림을 모두 읽습니다. 파싱할 수 없는 줄은 건너뜁니다.
    pub async fn read_all(&self) -> Result<Vec<AlertClassification>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(alert) => Some(alert),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "알림 로그 파싱 실패");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl AlertSink for JsonlAlertLog {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn deliver(&self, alert: &AlertClassification) -> Result<()> {
        let mut line = serde_json::to_vec(alert)?;
        line.push(b'\n');

        let _guard = self.write_guard.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MonitorError::Sink(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use trader_core::{AlertKind, Direction};

    fn alert(symbol: &str) -> AlertClassification {
        AlertClassification {
            symbol: symbol.to_string(),
            kind: AlertKind::ShortMove,
            direction: Direction::Rise,
            magnitude: 2.4,
            current_price: dec!(102.4),
            reference_price: dec!(100),
            volume: 10,
            avg_volume: None,
            lookback_minutes: 5,
            evaluated_at: Utc.with_ymd_and_hms(2026, 10, 19, 14, 5, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_jsonl_appends_one_line_per_alert() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAlertLog::new(dir.path().join("logs").join("alerts.jsonl"));

        log.deliver(&alert("AAPL")).await.unwrap();
        log.deliver(&alert("MSFT")).await.unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);

        let alerts = log.read_all().await.unwrap();
        assert_eq!(alerts[0].symbol, "AAPL");
        assert_eq!(alerts[1], alert("MSFT"));
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        assert!(TracingAlertSink.deliver(&alert("AAPL")).await.is_ok());
    }
}
