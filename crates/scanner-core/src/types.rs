use serde::{Deserialize, Serialize};

/// Per-ticker fundamental fields as reported by the market-data provider.
/// Every numeric field is optional; providers routinely omit fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub short_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub profit_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub earnings_growth: Option<f64>,
}

impl FundamentalSnapshot {
    /// Trailing P/E with forward P/E as fallback.
    pub fn effective_pe(&self) -> Option<f64> {
        self.trailing_pe.or(self.forward_pe)
    }

    /// Free cash flow yield as a percentage of market cap.
    pub fn fcf_yield(&self) -> Option<f64> {
        match (self.free_cash_flow, self.market_cap) {
            (Some(fcf), Some(cap)) if cap > 0.0 => Some(fcf / cap * 100.0),
            _ => None,
        }
    }

    /// A snapshot with no sector, price, or ratio data is useless to the scorer.
    pub fn has_any_data(&self) -> bool {
        self.current_price.is_some()
            || self.market_cap.is_some()
            || self.trailing_pe.is_some()
            || self.forward_pe.is_some()
            || self.price_to_book.is_some()
            || self.price_to_sales.is_some()
    }
}

/// One fiscal year of statement data, used for growth-trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub fiscal_year: i32,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

/// Growth-trend metrics computed from up to four annual statements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub revenue_cagr_3yr: Option<f64>,
    pub earnings_cagr_3yr: Option<f64>,
    pub fcf_cagr_3yr: Option<f64>,
    pub gross_margin_trend: Option<f64>,
    pub operating_margin_trend: Option<f64>,
    pub roe_trend: Option<f64>,
    /// Composite growth score on a -5..+5 scale, None when no factors were available.
    pub growth_score: Option<f64>,
}

impl GrowthMetrics {
    pub fn is_empty(&self) -> bool {
        self.revenue_cagr_3yr.is_none()
            && self.earnings_cagr_3yr.is_none()
            && self.fcf_cagr_3yr.is_none()
            && self.gross_margin_trend.is_none()
            && self.operating_margin_trend.is_none()
            && self.roe_trend.is_none()
    }
}

/// Competitive-position metrics relative to industry peers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetitiveMetrics {
    pub peer_count: usize,
    pub market_share: Option<f64>,
    pub relative_pe: Option<f64>,
    pub relative_margins: Option<f64>,
    pub relative_roe: Option<f64>,
    pub relative_growth: Option<f64>,
    /// Heuristic economic-moat score, 0-5 scale.
    pub moat_score: Option<f64>,
}

/// Discrete valuation label assigned from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assessment {
    #[serde(rename = "Strongly Undervalued")]
    StronglyUndervalued,
    #[serde(rename = "Undervalued")]
    Undervalued,
    #[serde(rename = "Fair Value")]
    FairValue,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Overvalued")]
    Overvalued,
    #[serde(rename = "Strongly Overvalued")]
    StronglyOvervalued,
}

/// Which cutoff scheme maps scores to labels. Callers must use one scheme
/// consistently within a scan; mixing them makes result rows incomparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentScheme {
    /// Five-tier labels with +/-1.5 and +/-3 cutoffs.
    Detailed,
    /// Three-tier labels with +/-2 cutoffs.
    Simple,
}

impl Assessment {
    pub fn from_score(score: f64, scheme: AssessmentScheme) -> Self {
        match scheme {
            AssessmentScheme::Detailed => {
                if score >= 3.0 {
                    Assessment::StronglyUndervalued
                } else if score >= 1.5 {
                    Assessment::Undervalued
                } else if score <= -3.0 {
                    Assessment::StronglyOvervalued
                } else if score <= -1.5 {
                    Assessment::Overvalued
                } else {
                    Assessment::FairValue
                }
            }
            AssessmentScheme::Simple => {
                if score >= 2.0 {
                    Assessment::Undervalued
                } else if score <= -2.0 {
                    Assessment::Overvalued
                } else {
                    Assessment::Neutral
                }
            }
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Assessment::StronglyUndervalued => "Strongly Undervalued",
            Assessment::Undervalued => "Undervalued",
            Assessment::FairValue => "Fair Value",
            Assessment::Neutral => "Neutral",
            Assessment::Overvalued => "Overvalued",
            Assessment::StronglyOvervalued => "Strongly Overvalued",
        }
    }
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_label())
    }
}

/// Full per-stock valuation record, one CSV row per stock in scan output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockValuation {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
    pub peg: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub fcf_yield: Option<f64>,
    pub benchmark_pe: Option<f64>,
    pub benchmark_pb: Option<f64>,
    pub benchmark_ps: Option<f64>,
    pub revenue_cagr_3yr: Option<f64>,
    pub earnings_cagr_3yr: Option<f64>,
    pub gross_margin_trend: Option<f64>,
    pub operating_margin_trend: Option<f64>,
    pub roe_trend: Option<f64>,
    pub growth_score: Option<f64>,
    pub market_share: Option<f64>,
    pub relative_pe: Option<f64>,
    pub relative_margins: Option<f64>,
    pub moat_score: Option<f64>,
    pub score: f64,
    pub assessment: Assessment,
}
