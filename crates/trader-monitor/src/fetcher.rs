//! HTTP 시세/과거 데이터 Provider.
//!
//! - `GET {base}/quotes?symbols=A,B` → 시세 JSON 배열
//! - `GET {base}/history/{symbol}?kind=daily_30d` → 캔들 JSON 배열

use crate::error::{MonitorError, Result as MonitorResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use trader_core::{Candle, HistoricalSeries, HistoryKind, Quote};
use trader_data::{DataError, HistoricalFetcher, QuoteFetcher, Result};

/// HTTP Provider.
#[derive(Debug, Clone)]
pub struct HttpQuoteFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuoteFetcher {
    /// 새 Provider 생성.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(MonitorError::Config("fetch_base_url이 비어 있습니다".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Http(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// 기본 URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        tracing::debug!(url = %url, "HTTP 요청");

        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DataError::FetchError(format!("요청 실패: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::FetchError(format!("HTTP {} - {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| DataError::FetchError(format!("응답 파싱 실패: {}", e)))
    }
}

#[async_trait]
impl QuoteFetcher for HttpQuoteFetcher {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        let url = format!("{}/quotes", self.base_url);
        let joined = symbols.join(",");
        let quotes: Vec<Quote> = self.get_json(&url, &[("symbols", joined.as_str())]).await?;

        Ok(quotes.into_iter().map(|q| (q.symbol.clone(), q)).collect())
    }
}

#[async_trait]
impl HistoricalFetcher for HttpQuoteFetcher {
    async fn fetch_series(&self, symbol: &str, kind: &HistoryKind) -> Result<HistoricalSeries> {
        let url = format!("{}/history/{}", self.base_url, symbol);
        let key = kind.key();
        let candles: Vec<Candle> = self.get_json(&url, &[("kind", key.as_str())]).await?;

        Ok(HistoricalSeries::new(candles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn fetcher(server: &mockito::Server) -> HttpQuoteFetcher {
        HttpQuoteFetcher::new(server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_quotes_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quotes")
            .match_query(Matcher::UrlEncoded("symbols".into(), "AAPL,MSFT".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"symbol":"AAPL","last":"190.5","open":"189","high":"191","low":"188.2","close":"188.9","volume":1200000,"capturedAt":"2026-10-19T14:30:00.250Z"},
                    {"symbol":"MSFT","last":"410","open":"409","high":"412","low":"405","close":"408","volume":800000,"capturedAt":"2026-10-19T14:30:00.250Z"}
                ]"#,
            )
            .create_async()
            .await;

        let quotes = fetcher(&server)
            .fetch_quotes(&["AAPL".to_string(), "MSFT".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["AAPL"].last, dec!(190.5));
        assert_eq!(quotes["MSFT"].volume, 800_000);
    }

    #[tokio::test]
    async fn test_fetch_quotes_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quotes")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = fetcher(&server)
            .fetch_quotes(&["AAPL".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::FetchError(ref msg) if msg.contains("503")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_series_sorted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/history/AAPL")
            .match_query(Matcher::UrlEncoded("kind".into(), "daily_30d".into()))
            .with_status(200)
            .with_body(
                r#"[
                    {"openTime":"2026-10-17T00:00:00Z","open":"2","high":"2","low":"2","close":"2","volume":20},
                    {"openTime":"2026-10-16T00:00:00Z","open":"1","high":"1","low":"1","close":"1","volume":10}
                ]"#,
            )
            .create_async()
            .await;

        let series = fetcher(&server)
            .fetch_series("AAPL", &HistoryKind::Daily30)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last_close(), Some(dec!(2)));
    }

    #[test]
    fn test_empty_base_url_is_config_error() {
        let err = HttpQuoteFetcher::new("  ", Duration::from_secs(1));
        assert!(err.is_err());
    }
}
