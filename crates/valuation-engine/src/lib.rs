use industry_benchmarks::BenchmarkSet;
use scanner_core::{
    Assessment, AssessmentScheme, CompetitiveMetrics, FundamentalSnapshot, GrowthMetrics,
    StockValuation,
};

pub mod config;
pub use config::{MetricThresholds, ValuationThresholds};

/// Signed point contributions, one per evaluated metric, summed into the
/// total valuation score.
#[derive(Debug, Default)]
pub struct ScoreBreakdown {
    contributions: Vec<(&'static str, f64)>,
}

impl ScoreBreakdown {
    pub fn add(&mut self, metric: &'static str, points: f64) {
        if points != 0.0 {
            self.contributions.push((metric, points));
        }
    }

    pub fn total(&self) -> f64 {
        self.contributions.iter().map(|(_, p)| p).sum()
    }

    pub fn contributions(&self) -> &[(&'static str, f64)] {
        &self.contributions
    }
}

/// Compare an actual ratio against benchmark x multiplier bounds.
/// Missing data on either side contributes nothing.
pub fn evaluate_metric(
    actual: Option<f64>,
    benchmark: Option<f64>,
    thresholds: &MetricThresholds,
) -> f64 {
    let (Some(actual), Some(benchmark)) = (actual, benchmark) else {
        return 0.0;
    };
    if actual < benchmark * thresholds.undervalued {
        1.0
    } else if actual > benchmark * thresholds.overvalued {
        -1.0
    } else {
        0.0
    }
}

/// Multi-factor valuation scorer: ratio comparisons against resolved
/// benchmarks plus growth and competitive-moat overlays.
pub struct ValuationEngine {
    thresholds: ValuationThresholds,
    scheme: AssessmentScheme,
}

impl ValuationEngine {
    pub fn new(scheme: AssessmentScheme) -> Self {
        Self {
            thresholds: ValuationThresholds::default(),
            scheme,
        }
    }

    pub fn with_thresholds(mut self, thresholds: ValuationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn scheme(&self) -> AssessmentScheme {
        self.scheme
    }

    /// Score one stock against its resolved benchmarks. Growth and
    /// competitive metrics are optional overlays; a missing field anywhere
    /// contributes zero rather than failing the assessment.
    pub fn assess(
        &self,
        snapshot: &FundamentalSnapshot,
        benchmarks: &BenchmarkSet,
        growth: Option<&GrowthMetrics>,
        competitive: Option<&CompetitiveMetrics>,
    ) -> StockValuation {
        let t = &self.thresholds;
        let mut breakdown = ScoreBreakdown::default();

        let pe = snapshot.effective_pe();
        let fcf_yield = snapshot.fcf_yield();

        breakdown.add("pe", evaluate_metric(pe, benchmarks.pe, &t.pe));
        breakdown.add("pb", evaluate_metric(snapshot.price_to_book, benchmarks.pb, &t.pb));
        breakdown.add("ps", evaluate_metric(snapshot.price_to_sales, benchmarks.ps, &t.ps));
        breakdown.add("peg", evaluate_metric(snapshot.peg_ratio, benchmarks.peg, &t.peg));

        // FCF yield: higher is better, so the benchmark comparison inverts.
        // Falls back to absolute thresholds without a benchmark yield.
        if let Some(yield_pct) = fcf_yield {
            if let Some(bench) = benchmarks.fcf_yield {
                if yield_pct > bench * 1.5 {
                    breakdown.add("fcf_yield", 1.0);
                } else if yield_pct < bench * 0.5 {
                    breakdown.add("fcf_yield", -1.0);
                }
            } else if yield_pct > t.fcf_yield.undervalued {
                breakdown.add("fcf_yield", 1.0);
            } else if yield_pct < t.fcf_yield.overvalued {
                breakdown.add("fcf_yield", -1.0);
            }
        }

        // Debt/equity: lower leverage favored, half weight
        if let Some(de) = snapshot.debt_to_equity {
            if let Some(bench) = benchmarks.de {
                if de < bench * 0.7 {
                    breakdown.add("de", 0.5);
                } else if de > bench * 1.3 {
                    breakdown.add("de", -0.5);
                }
            } else if de < t.de.undervalued {
                breakdown.add("de", 0.5);
            } else if de > t.de.overvalued {
                breakdown.add("de", -0.5);
            }
        }

        let growth_score = growth.and_then(|g| g.growth_score);
        if let Some(gs) = growth_score {
            if gs > 3.0 {
                breakdown.add("growth", 1.5);
            } else if gs > 1.0 {
                breakdown.add("growth", 1.0);
            } else if gs < -1.0 {
                breakdown.add("growth", -1.0);
            }
        }

        let moat_score = competitive.and_then(|c| c.moat_score);
        if let Some(ms) = moat_score {
            if ms > 3.5 {
                breakdown.add("moat", 1.5);
            } else if ms > 2.5 {
                breakdown.add("moat", 1.0);
            }
        }

        let mut score = breakdown.total();

        // Tie-break: a net-zero multiple comparison with jointly strong
        // growth and moat leans undervalued.
        if score == 0.0 {
            let joint = growth_score.unwrap_or(0.0) + moat_score.unwrap_or(0.0);
            if growth.is_some() && competitive.is_some() && joint > 7.0 {
                score += 1.0;
            }
        }

        let score = (score * 10.0).round() / 10.0;
        let assessment = Assessment::from_score(score, self.scheme);

        tracing::debug!(
            symbol = %snapshot.symbol,
            score,
            assessment = assessment.to_label(),
            "valuation assessed"
        );

        StockValuation {
            symbol: snapshot.symbol.clone(),
            name: snapshot
                .short_name
                .clone()
                .unwrap_or_else(|| snapshot.symbol.clone()),
            sector: snapshot.sector.clone(),
            industry: snapshot.industry.clone(),
            price: snapshot.current_price,
            market_cap: snapshot.market_cap,
            pe,
            pb: snapshot.price_to_book,
            ps: snapshot.price_to_sales,
            peg: snapshot.peg_ratio,
            debt_to_equity: snapshot.debt_to_equity,
            fcf_yield,
            benchmark_pe: benchmarks.pe,
            benchmark_pb: benchmarks.pb,
            benchmark_ps: benchmarks.ps,
            revenue_cagr_3yr: growth.and_then(|g| g.revenue_cagr_3yr),
            earnings_cagr_3yr: growth.and_then(|g| g.earnings_cagr_3yr),
            gross_margin_trend: growth.and_then(|g| g.gross_margin_trend),
            operating_margin_trend: growth.and_then(|g| g.operating_margin_trend),
            roe_trend: growth.and_then(|g| g.roe_trend),
            growth_score,
            market_share: competitive.and_then(|c| c.market_share),
            relative_pe: competitive.and_then(|c| c.relative_pe),
            relative_margins: competitive.and_then(|c| c.relative_margins),
            moat_score,
            score,
            assessment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FundamentalSnapshot {
        FundamentalSnapshot {
            symbol: "TEST".to_string(),
            short_name: Some("Test Corp".to_string()),
            ..Default::default()
        }
    }

    fn benchmarks() -> BenchmarkSet {
        BenchmarkSet {
            pe: Some(20.0),
            pb: Some(5.0),
            ps: None,
            peg: None,
            de: Some(1.0),
            fcf_yield: None,
        }
    }

    #[test]
    fn evaluate_metric_missing_data_is_zero() {
        let t = MetricThresholds { undervalued: 0.8, overvalued: 1.2 };
        assert_eq!(evaluate_metric(None, Some(20.0), &t), 0.0);
        assert_eq!(evaluate_metric(Some(10.0), None, &t), 0.0);
        assert_eq!(evaluate_metric(None, None, &t), 0.0);
    }

    #[test]
    fn evaluate_metric_thresholds() {
        let t = MetricThresholds { undervalued: 0.8, overvalued: 1.2 };
        assert_eq!(evaluate_metric(Some(10.0), Some(20.0), &t), 1.0);
        assert_eq!(evaluate_metric(Some(30.0), Some(20.0), &t), -1.0);
        assert_eq!(evaluate_metric(Some(20.0), Some(20.0), &t), 0.0);
        // Boundary: exactly benchmark * undervalued is not a hit
        assert_eq!(evaluate_metric(Some(16.0), Some(20.0), &t), 0.0);
    }

    #[test]
    fn worked_example_scores_2_5_and_reads_undervalued_under_simple_scheme() {
        // P/E 10 vs 20, P/B 2 vs 5, no PEG, no FCF, D/E 0.3 vs benchmark 1.0
        let snap = FundamentalSnapshot {
            trailing_pe: Some(10.0),
            price_to_book: Some(2.0),
            debt_to_equity: Some(0.3),
            ..snapshot()
        };
        let engine = ValuationEngine::new(AssessmentScheme::Simple);
        let result = engine.assess(&snap, &benchmarks(), None, None);
        assert_eq!(result.score, 2.5);
        assert_eq!(result.assessment, Assessment::Undervalued);
    }

    #[test]
    fn empty_snapshot_scores_zero_without_panicking() {
        let engine = ValuationEngine::new(AssessmentScheme::Detailed);
        let result = engine.assess(&snapshot(), &benchmarks(), None, None);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.assessment, Assessment::FairValue);
    }

    #[test]
    fn lowering_pe_below_threshold_never_decreases_score() {
        let engine = ValuationEngine::new(AssessmentScheme::Detailed);
        let base = FundamentalSnapshot {
            trailing_pe: Some(17.0),
            price_to_book: Some(4.0),
            debt_to_equity: Some(1.0),
            ..snapshot()
        };
        let reference = engine.assess(&base, &benchmarks(), None, None).score;

        for pe in [15.9, 12.0, 8.0, 1.0] {
            let snap = FundamentalSnapshot {
                trailing_pe: Some(pe),
                ..base.clone()
            };
            let score = engine.assess(&snap, &benchmarks(), None, None).score;
            assert!(
                score >= reference,
                "pe {} dropped score to {} (reference {})",
                pe,
                score,
                reference
            );
        }
    }

    #[test]
    fn growth_and_moat_overlays_contribute_bands() {
        let engine = ValuationEngine::new(AssessmentScheme::Detailed);
        let growth = GrowthMetrics {
            growth_score: Some(3.5),
            ..Default::default()
        };
        let competitive = CompetitiveMetrics {
            moat_score: Some(2.6),
            ..Default::default()
        };
        let result = engine.assess(&snapshot(), &benchmarks(), Some(&growth), Some(&competitive));
        // +1.5 growth, +1.0 moat
        assert_eq!(result.score, 2.5);
    }

    #[test]
    fn negative_growth_detracts() {
        let engine = ValuationEngine::new(AssessmentScheme::Detailed);
        let growth = GrowthMetrics {
            growth_score: Some(-2.0),
            ..Default::default()
        };
        let result = engine.assess(&snapshot(), &benchmarks(), Some(&growth), None);
        assert_eq!(result.score, -1.0);
    }

    #[test]
    fn strong_fundamentals_tie_break_nudges_net_zero_score() {
        // Overvalued on P/E, P/B, and P/S (-3) offset exactly by strong
        // growth (+1.5) and wide moat (+1.5); joint 3.6 + 3.6 > 7 nudges +1.
        let engine = ValuationEngine::new(AssessmentScheme::Detailed);
        let snap = FundamentalSnapshot {
            trailing_pe: Some(50.0),
            price_to_book: Some(10.0),
            price_to_sales: Some(12.0),
            ..snapshot()
        };
        let bench = BenchmarkSet {
            pe: Some(20.0),
            pb: Some(5.0),
            ps: Some(4.0),
            ..Default::default()
        };
        let growth = GrowthMetrics {
            growth_score: Some(3.6),
            ..Default::default()
        };
        let competitive = CompetitiveMetrics {
            moat_score: Some(3.6),
            ..Default::default()
        };
        let result = engine.assess(&snap, &bench, Some(&growth), Some(&competitive));
        assert_eq!(result.score, 1.0);
    }
}
