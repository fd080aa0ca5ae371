use scanner_core::{FinancialStatement, GrowthMetrics};

/// Analyzes multi-year growth trends from annual statement history.
///
/// Statements are expected newest first. CAGRs span up to three years;
/// margin and ROE trends compare the newest year against the oldest
/// available year.
pub struct GrowthAnalyzer;

impl GrowthAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Compute growth metrics. Fewer than two statements yield empty
    /// metrics; each individual metric degrades to None when its inputs
    /// are missing.
    pub fn analyze(&self, statements: &[FinancialStatement]) -> GrowthMetrics {
        if statements.len() < 2 {
            return GrowthMetrics::default();
        }

        let mut metrics = GrowthMetrics {
            revenue_cagr_3yr: cagr(statements, |s| s.revenue, false),
            earnings_cagr_3yr: cagr(statements, |s| s.net_income, true),
            fcf_cagr_3yr: cagr(statements, |s| s.free_cash_flow, true),
            gross_margin_trend: margin_trend(statements, |s| s.gross_profit),
            operating_margin_trend: margin_trend(statements, |s| s.operating_income),
            roe_trend: roe_trend(statements),
            growth_score: None,
        };
        metrics.growth_score = Some(growth_score(&metrics));
        metrics
    }
}

impl Default for GrowthAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Annualized growth rate in percent between the newest statement and the
/// one up to three years older. When `positive_only` is set the CAGR is
/// suppressed unless both endpoints are positive (negative earnings or FCF
/// produce misleading rates).
fn cagr(
    statements: &[FinancialStatement],
    field: fn(&FinancialStatement) -> Option<f64>,
    positive_only: bool,
) -> Option<f64> {
    if statements.len() < 3 {
        return None;
    }
    let span = 3.min(statements.len() - 1);
    let latest = field(&statements[0])?;
    let oldest = field(&statements[span])?;

    if positive_only {
        if latest <= 0.0 || oldest <= 0.0 {
            return None;
        }
    } else if oldest == 0.0 {
        return None;
    }

    Some(((latest / oldest).powf(1.0 / span as f64) - 1.0) * 100.0)
}

/// Newest-year margin minus oldest-year margin, in percentage points.
fn margin_trend(
    statements: &[FinancialStatement],
    numerator: fn(&FinancialStatement) -> Option<f64>,
) -> Option<f64> {
    let margins: Vec<f64> = statements
        .iter()
        .take(4)
        .filter_map(|s| {
            let revenue = s.revenue?;
            if revenue == 0.0 {
                return None;
            }
            Some(numerator(s)? / revenue * 100.0)
        })
        .collect();

    if margins.len() < 2 {
        return None;
    }
    Some(margins[0] - margins[margins.len() - 1])
}

fn roe_trend(statements: &[FinancialStatement]) -> Option<f64> {
    let roes: Vec<f64> = statements
        .iter()
        .take(4)
        .filter_map(|s| {
            let equity = s.total_assets? - s.total_liabilities?;
            if equity <= 0.0 {
                return None;
            }
            Some(s.net_income? / equity * 100.0)
        })
        .collect();

    if roes.len() < 2 {
        return None;
    }
    Some(roes[0] - roes[roes.len() - 1])
}

/// Bucket each available factor into {+2, +1, 0, -1}, average across the
/// factors present, and rescale to a -5..+5 range (one decimal).
fn growth_score(metrics: &GrowthMetrics) -> f64 {
    let mut score = 0i32;
    let mut factors = 0u32;

    let mut bucket = |value: Option<f64>, strong: f64, good: f64, weak: f64| {
        if let Some(v) = value {
            factors += 1;
            if v > strong {
                score += 2;
            } else if v > good {
                score += 1;
            } else if v < weak {
                score -= 1;
            }
        }
    };

    bucket(metrics.revenue_cagr_3yr, 15.0, 7.0, 0.0);
    bucket(metrics.earnings_cagr_3yr, 20.0, 10.0, 0.0);
    bucket(metrics.gross_margin_trend, 3.0, 1.0, -1.0);
    bucket(metrics.operating_margin_trend, 2.0, 0.5, -0.5);
    bucket(metrics.roe_trend, 5.0, 2.0, -2.0);
    bucket(metrics.fcf_cagr_3yr, 20.0, 10.0, 0.0);

    if factors == 0 {
        return 0.0;
    }
    let normalized = score as f64 / factors as f64 * 5.0;
    (normalized * 10.0).round() / 10.0
}
