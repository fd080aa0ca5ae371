use async_trait::async_trait;
use reqwest::Client;
use scanner_core::{FinancialStatement, FundamentalSnapshot, FundamentalsProvider, ScanError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod tickers;
pub use tickers::{NasdaqTickerSource, StaticTickerSource};

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let wait_until = ts.front().unwrap().checked_add(self.window).unwrap();
            let sleep_dur = wait_until.duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for provider API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Yahoo-style quote-summary client. Thin I/O glue: given a ticker, return a
/// mapping of named fundamental fields, all nullable.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl YahooClient {
    pub fn new() -> Self {
        // Public endpoints throttle aggressively. Override with
        // MARKET_DATA_RATE_LIMIT (requests per minute) when using a paid plan.
        let rate_limit: usize = std::env::var("MARKET_DATA_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ScanError> {
        let request = builder
            .build()
            .map_err(|e| ScanError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| ScanError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| ScanError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "Provider 429 rate limited, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(ScanError::ApiError(
            "Rate limited by provider after 3 retries".to_string(),
        ))
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Value, ScanError> {
        let url = format!("{}/{}", QUOTE_SUMMARY_URL, symbol);
        let response = self
            .send_request(self.client.get(&url).query(&[("modules", modules)]))
            .await?;

        if !response.status().is_success() {
            return Err(ScanError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ScanError::ApiError(e.to_string()))?;

        json.get("quoteSummary")
            .and_then(|v| v.get("result"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| ScanError::ApiError(format!("No quote summary data for {}", symbol)))
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Yahoo wraps numeric fields as `{"raw": 1.23, "fmt": "1.23"}`.
fn raw_f64(data: &Value, key: &str) -> Option<f64> {
    let field = data.get(key)?;
    field.get("raw").and_then(|v| v.as_f64()).or_else(|| field.as_f64())
}

fn raw_str(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Build a snapshot from a parsed quote-summary result. Every field is
/// optional; anything the provider omits stays None.
pub fn snapshot_from_value(symbol: &str, result: &Value) -> FundamentalSnapshot {
    let empty = Value::Object(serde_json::Map::new());
    let profile = result.get("summaryProfile").unwrap_or(&empty);
    let price = result.get("price").unwrap_or(&empty);
    let key_stats = result.get("defaultKeyStatistics").unwrap_or(&empty);
    let summary = result.get("summaryDetail").unwrap_or(&empty);
    let financial = result.get("financialData").unwrap_or(&empty);

    FundamentalSnapshot {
        symbol: symbol.to_string(),
        short_name: raw_str(price, "shortName"),
        sector: raw_str(profile, "sector"),
        industry: raw_str(profile, "industry"),
        current_price: raw_f64(financial, "currentPrice")
            .or_else(|| raw_f64(price, "regularMarketPrice")),
        market_cap: raw_f64(price, "marketCap").or_else(|| raw_f64(summary, "marketCap")),
        trailing_pe: raw_f64(summary, "trailingPE"),
        forward_pe: raw_f64(summary, "forwardPE").or_else(|| raw_f64(key_stats, "forwardPE")),
        price_to_book: raw_f64(key_stats, "priceToBook"),
        price_to_sales: raw_f64(summary, "priceToSalesTrailing12Months"),
        peg_ratio: raw_f64(key_stats, "pegRatio"),
        debt_to_equity: raw_f64(financial, "debtToEquity"),
        free_cash_flow: raw_f64(financial, "freeCashflow"),
        gross_margin: raw_f64(financial, "grossMargins"),
        operating_margin: raw_f64(financial, "operatingMargins"),
        profit_margin: raw_f64(key_stats, "profitMargins")
            .or_else(|| raw_f64(financial, "profitMargins")),
        return_on_equity: raw_f64(financial, "returnOnEquity"),
        earnings_growth: raw_f64(financial, "earningsGrowth"),
    }
}

/// Build annual statements from income/balance/cashflow history modules,
/// newest first, up to four fiscal years.
pub fn statements_from_value(result: &Value) -> Vec<FinancialStatement> {
    fn history<'a>(result: &'a Value, module: &str, list_key: &str) -> Vec<&'a Value> {
        result
            .get(module)
            .and_then(|v| v.get(list_key))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().collect())
            .unwrap_or_default()
    }

    fn fiscal_year(entry: &Value) -> Option<i32> {
        entry
            .get("endDate")
            .and_then(|v| v.get("fmt"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.split('-').next())
            .and_then(|y| y.parse().ok())
    }

    let income = history(result, "incomeStatementHistory", "incomeStatementHistory");
    let balance = history(result, "balanceSheetHistory", "balanceSheetStatements");
    let cashflow = history(result, "cashflowStatementHistory", "cashflowStatements");

    let mut statements = Vec::new();
    for entry in income.into_iter().take(4) {
        let Some(year) = fiscal_year(entry) else {
            continue;
        };

        let balance_entry = balance
            .iter()
            .copied()
            .find(|&b| fiscal_year(b) == Some(year));
        let cashflow_entry = cashflow
            .iter()
            .copied()
            .find(|&c| fiscal_year(c) == Some(year));

        // Free cash flow = operating cash flow less capital expenditures.
        // Capex is reported as a negative outflow.
        let fcf = cashflow_entry.and_then(|c| {
            let ocf = raw_f64(c, "totalCashFromOperatingActivities")?;
            let capex = raw_f64(c, "capitalExpenditures").unwrap_or(0.0);
            Some(ocf + capex)
        });

        statements.push(FinancialStatement {
            fiscal_year: year,
            revenue: raw_f64(entry, "totalRevenue"),
            gross_profit: raw_f64(entry, "grossProfit"),
            operating_income: raw_f64(entry, "operatingIncome"),
            net_income: raw_f64(entry, "netIncome"),
            total_assets: balance_entry.and_then(|b| raw_f64(b, "totalAssets")),
            total_liabilities: balance_entry.and_then(|b| raw_f64(b, "totalLiab")),
            free_cash_flow: fcf,
        });
    }

    statements
}

#[async_trait]
impl FundamentalsProvider for YahooClient {
    async fn fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, ScanError> {
        let result = self
            .quote_summary(
                symbol,
                "summaryProfile,price,defaultKeyStatistics,summaryDetail,financialData",
            )
            .await?;
        Ok(snapshot_from_value(symbol, &result))
    }

    async fn annual_financials(&self, symbol: &str) -> Result<Vec<FinancialStatement>, ScanError> {
        let result = self
            .quote_summary(
                symbol,
                "incomeStatementHistory,balanceSheetHistory,cashflowStatementHistory",
            )
            .await?;
        Ok(statements_from_value(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_parses_raw_wrapped_fields() {
        let result = json!({
            "summaryProfile": {"sector": "Technology", "industry": "Software - Application"},
            "price": {"shortName": "Example Corp", "regularMarketPrice": {"raw": 101.5}, "marketCap": {"raw": 5.0e10}},
            "summaryDetail": {"trailingPE": {"raw": 22.4}, "priceToSalesTrailing12Months": {"raw": 4.1}},
            "defaultKeyStatistics": {"priceToBook": {"raw": 6.2}, "pegRatio": {"raw": 1.4}},
            "financialData": {"debtToEquity": {"raw": 85.0}, "freeCashflow": {"raw": 2.0e9}}
        });

        let snap = snapshot_from_value("EXMP", &result);
        assert_eq!(snap.sector.as_deref(), Some("Technology"));
        assert_eq!(snap.current_price, Some(101.5));
        assert_eq!(snap.trailing_pe, Some(22.4));
        assert_eq!(snap.price_to_book, Some(6.2));
        assert_eq!(snap.peg_ratio, Some(1.4));
        assert_eq!(snap.forward_pe, None);
        assert!(snap.has_any_data());
    }

    #[test]
    fn snapshot_tolerates_missing_modules() {
        let snap = snapshot_from_value("EMPTY", &json!({}));
        assert_eq!(snap.symbol, "EMPTY");
        assert!(snap.sector.is_none());
        assert!(snap.trailing_pe.is_none());
        assert!(!snap.has_any_data());
    }

    #[test]
    fn statements_align_by_fiscal_year() {
        let result = json!({
            "incomeStatementHistory": {"incomeStatementHistory": [
                {"endDate": {"fmt": "2024-12-31"}, "totalRevenue": {"raw": 1000.0}, "netIncome": {"raw": 100.0}},
                {"endDate": {"fmt": "2023-12-31"}, "totalRevenue": {"raw": 800.0}, "netIncome": {"raw": 60.0}}
            ]},
            "balanceSheetHistory": {"balanceSheetStatements": [
                {"endDate": {"fmt": "2023-12-31"}, "totalAssets": {"raw": 5000.0}, "totalLiab": {"raw": 3000.0}}
            ]},
            "cashflowStatementHistory": {"cashflowStatements": [
                {"endDate": {"fmt": "2024-12-31"}, "totalCashFromOperatingActivities": {"raw": 150.0}, "capitalExpenditures": {"raw": -50.0}}
            ]}
        });

        let statements = statements_from_value(&result);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].fiscal_year, 2024);
        assert_eq!(statements[0].revenue, Some(1000.0));
        assert_eq!(statements[0].free_cash_flow, Some(100.0));
        assert_eq!(statements[0].total_assets, None);
        assert_eq!(statements[1].fiscal_year, 2023);
        assert_eq!(statements[1].total_assets, Some(5000.0));
        assert_eq!(statements[1].free_cash_flow, None);
    }
}
