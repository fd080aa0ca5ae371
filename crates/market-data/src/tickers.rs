use async_trait::async_trait;
use scanner_core::{ScanError, TickerSource};
use serde_json::Value;

const NASDAQ_SCREENER_URL: &str =
    "https://api.nasdaq.com/api/screener/stocks?tableonly=true&limit=10000";

/// Fetches the NASDAQ screener ticker table.
pub struct NasdaqTickerSource {
    client: reqwest::Client,
}

impl NasdaqTickerSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(super::USER_AGENT)
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Symbols longer than 5 chars or carrying class/warrant markers break
    /// downstream provider lookups.
    fn is_clean_symbol(symbol: &str) -> bool {
        !symbol.is_empty()
            && symbol.len() <= 5
            && !symbol.contains(['/', '^', '$'])
    }

    fn parse_symbols(json: &Value) -> Result<Vec<String>, ScanError> {
        let rows = json
            .get("data")
            .and_then(|v| v.get("table"))
            .and_then(|v| v.get("rows"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ScanError::InvalidData("Unexpected screener API response structure".to_string())
            })?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("symbol").and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .filter(|s| Self::is_clean_symbol(s))
            .collect())
    }
}

impl Default for NasdaqTickerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TickerSource for NasdaqTickerSource {
    async fn tickers(&self) -> Result<Vec<String>, ScanError> {
        let response = self
            .client
            .get(NASDAQ_SCREENER_URL)
            .header("Accept", "application/json, text/plain, */*")
            .header("Origin", "https://www.nasdaq.com")
            .header("Referer", "https://www.nasdaq.com/")
            .send()
            .await
            .map_err(|e| ScanError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::ApiError(format!(
                "Screener API returned HTTP {}",
                response.status()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ScanError::ApiError(e.to_string()))?;

        let symbols = Self::parse_symbols(&json)?;
        tracing::info!("Fetched {} NASDAQ symbols", symbols.len());
        Ok(symbols)
    }
}

/// Fixed ticker list, for ad-hoc analysis and tests.
pub struct StaticTickerSource {
    symbols: Vec<String>,
}

impl StaticTickerSource {
    pub fn new(symbols: Vec<String>) -> Self {
        Self { symbols }
    }
}

#[async_trait]
impl TickerSource for StaticTickerSource {
    async fn tickers(&self) -> Result<Vec<String>, ScanError> {
        Ok(self.symbols.clone())
    }
}
