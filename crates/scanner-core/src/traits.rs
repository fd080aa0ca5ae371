use crate::{FinancialStatement, FundamentalSnapshot, ScanError};
use async_trait::async_trait;

/// Trait for market-data providers that expose per-ticker fundamentals.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Fetch the current fundamental snapshot for a symbol.
    async fn fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, ScanError>;

    /// Fetch up to four annual statement periods, newest first.
    async fn annual_financials(&self, symbol: &str) -> Result<Vec<FinancialStatement>, ScanError>;
}

/// Trait for ticker-universe sources.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn tickers(&self) -> Result<Vec<String>, ScanError>;
}
