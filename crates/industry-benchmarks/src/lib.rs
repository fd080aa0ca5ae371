use scanner_core::{FundamentalSnapshot, FundamentalsProvider, ScanError};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

mod sampling;
pub use sampling::{select_sample, SamplePlan};

/// Reference values for the six benchmark metrics, one set per industry,
/// sector, or the market as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSet {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
    pub peg: Option<f64>,
    pub de: Option<f64>,
    pub fcf_yield: Option<f64>,
}

impl BenchmarkSet {
    /// Hardcoded market-wide defaults, used before any sample has been taken.
    pub fn market_defaults() -> Self {
        Self {
            pe: Some(20.0),
            pb: Some(3.0),
            ps: Some(3.0),
            peg: Some(1.5),
            de: Some(1.0),
            fcf_yield: Some(3.0),
        }
    }
}

/// One sampled observation: a ticker's classification plus its raw metrics.
#[derive(Debug, Clone)]
pub struct MetricsSample {
    pub symbol: String,
    pub sector: String,
    pub industry: String,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
    pub peg: Option<f64>,
    pub de: Option<f64>,
    pub fcf_yield: Option<f64>,
}

impl MetricsSample {
    pub fn from_snapshot(snap: &FundamentalSnapshot, sector: &str, industry: &str) -> Self {
        Self {
            symbol: snap.symbol.clone(),
            sector: sector.to_string(),
            industry: industry.to_string(),
            pe: snap.effective_pe(),
            pb: snap.price_to_book,
            ps: snap.price_to_sales,
            peg: snap.peg_ratio,
            de: snap.debt_to_equity,
            fcf_yield: snap.fcf_yield(),
        }
    }
}

/// Mean after discarding observations outside the [P10, P90] band.
/// Falls back to the plain mean below 3 valid observations, None when empty.
pub fn trimmed_mean(values: &[Option<f64>]) -> Option<f64> {
    let valid: Vec<f64> = values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect();

    if valid.is_empty() {
        return None;
    }
    if valid.len() < 3 {
        return Some(valid.iter().copied().mean());
    }

    let mut sorted = valid.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let q_low = quantile(&sorted, 0.1);
    let q_high = quantile(&sorted, 0.9);

    let trimmed: Vec<f64> = valid
        .into_iter()
        .filter(|v| *v >= q_low && *v <= q_high)
        .collect();

    // The band always contains the median, so trimmed is never empty
    Some(trimmed.iter().copied().mean())
}

/// Linearly interpolated quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

fn aggregate_group(samples: &[&MetricsSample]) -> BenchmarkSet {
    BenchmarkSet {
        pe: trimmed_mean(&samples.iter().map(|s| s.pe).collect::<Vec<_>>()),
        pb: trimmed_mean(&samples.iter().map(|s| s.pb).collect::<Vec<_>>()),
        ps: trimmed_mean(&samples.iter().map(|s| s.ps).collect::<Vec<_>>()),
        peg: trimmed_mean(&samples.iter().map(|s| s.peg).collect::<Vec<_>>()),
        de: trimmed_mean(&samples.iter().map(|s| s.de).collect::<Vec<_>>()),
        fcf_yield: trimmed_mean(&samples.iter().map(|s| s.fcf_yield).collect::<Vec<_>>()),
    }
}

/// Tuning knobs for the sampling pass.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Target sample size per sector, split across its industries.
    pub sample_size: usize,
    /// Cap on tickers examined in the classification pass.
    pub classification_cap: usize,
    /// Uniform per-request delay range in milliseconds. (0, 0) disables
    /// sleeping, which makes benchmark building deterministic in tests.
    pub delay_ms: (u64, u64),
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            classification_cap: 500,
            delay_ms: (250, 750),
        }
    }
}

/// Calculates and stores dynamic benchmark tables at industry, sector, and
/// market level from a sample of the ticker universe.
#[derive(Debug, Default)]
pub struct BenchmarkCalculator {
    industry_table: BTreeMap<String, BenchmarkSet>,
    sector_table: BTreeMap<String, BenchmarkSet>,
    market_averages: BenchmarkSet,
    initialized: bool,
}

impl BenchmarkCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn industry_table(&self) -> &BTreeMap<String, BenchmarkSet> {
        &self.industry_table
    }

    pub fn sector_table(&self) -> &BTreeMap<String, BenchmarkSet> {
        &self.sector_table
    }

    /// Two-pass initialization: classify tickers by (sector, industry), pick
    /// a capped per-industry sample, then aggregate trimmed means.
    /// Individual fetch failures are logged and skipped.
    pub async fn initialize_with_sample(
        &mut self,
        provider: &dyn FundamentalsProvider,
        tickers: &[String],
        config: &BenchmarkConfig,
    ) -> Result<usize, ScanError> {
        tracing::info!(
            "Calculating industry averages from a sample of {} tickers",
            tickers.len().min(config.classification_cap)
        );

        // First pass: sector/industry classification
        let mut plan = SamplePlan::new();
        for ticker in tickers.iter().take(config.classification_cap) {
            sleep_jitter(config.delay_ms).await;
            let snap = match provider.fundamentals(ticker).await {
                Ok(snap) => snap,
                Err(e) => {
                    tracing::warn!("Error collecting sector data for {}: {}", ticker, e);
                    continue;
                }
            };
            let (Some(sector), Some(industry)) = (snap.sector.clone(), snap.industry.clone())
            else {
                continue;
            };
            plan.add(ticker, &sector, &industry);
        }

        let sample_tickers = select_sample(&plan, config.sample_size);

        // Second pass: metrics for the selected sample
        let mut samples = Vec::new();
        for ticker in &sample_tickers {
            sleep_jitter(config.delay_ms).await;
            let snap = match provider.fundamentals(ticker).await {
                Ok(snap) => snap,
                Err(e) => {
                    tracing::warn!("Error collecting metrics for {}: {}", ticker, e);
                    continue;
                }
            };
            let Some((sector, industry)) = plan.classification(ticker) else {
                continue;
            };
            samples.push(MetricsSample::from_snapshot(&snap, &sector, &industry));
        }

        self.rebuild_from_samples(&samples);

        tracing::info!(
            "Industry averages calculated from {} companies across {} industries",
            samples.len(),
            self.industry_table.len()
        );
        Ok(samples.len())
    }

    /// Aggregate already-collected samples into the three tables.
    /// Deterministic: the same samples always produce identical tables.
    pub fn rebuild_from_samples(&mut self, samples: &[MetricsSample]) {
        self.industry_table.clear();
        self.sector_table.clear();

        let mut by_industry: BTreeMap<&str, Vec<&MetricsSample>> = BTreeMap::new();
        let mut by_sector: BTreeMap<&str, Vec<&MetricsSample>> = BTreeMap::new();
        for sample in samples {
            by_industry.entry(&sample.industry).or_default().push(sample);
            by_sector.entry(&sample.sector).or_default().push(sample);
        }

        for (industry, group) in by_industry {
            self.industry_table
                .insert(industry.to_string(), aggregate_group(&group));
        }
        for (sector, group) in by_sector {
            self.sector_table
                .insert(sector.to_string(), aggregate_group(&group));
        }

        let all: Vec<&MetricsSample> = samples.iter().collect();
        self.market_averages = aggregate_group(&all);
        self.initialized = true;
    }

    /// Resolve benchmarks for a stock: industry table, then sector table,
    /// then market averages. Hardcoded defaults before initialization.
    pub fn averages_for(&self, sector: Option<&str>, industry: Option<&str>) -> BenchmarkSet {
        if !self.initialized {
            return BenchmarkSet::market_defaults();
        }

        if let Some(set) = industry.and_then(|i| self.industry_table.get(i)) {
            return set.clone();
        }
        if let Some(set) = sector.and_then(|s| self.sector_table.get(s)) {
            return set.clone();
        }
        self.market_averages.clone()
    }

    /// Write the industry and sector tables to CSV for reference.
    pub fn write_tables_csv(
        &self,
        industry_path: &Path,
        sector_path: &Path,
    ) -> Result<(), ScanError> {
        write_table(industry_path, "industry", &self.industry_table)?;
        write_table(sector_path, "sector", &self.sector_table)?;
        Ok(())
    }
}

fn write_table(
    path: &Path,
    key_column: &str,
    table: &BTreeMap<String, BenchmarkSet>,
) -> Result<(), ScanError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| ScanError::OutputError(e.to_string()))?;
    writer
        .write_record([key_column, "pe", "pb", "ps", "peg", "de", "fcf_yield"])
        .map_err(|e| ScanError::OutputError(e.to_string()))?;

    for (name, set) in table {
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_default();
        writer
            .write_record([
                name.clone(),
                fmt(set.pe),
                fmt(set.pb),
                fmt(set.ps),
                fmt(set.peg),
                fmt(set.de),
                fmt(set.fcf_yield),
            ])
            .map_err(|e| ScanError::OutputError(e.to_string()))?;
    }
    writer.flush().map_err(|e| ScanError::OutputError(e.to_string()))?;
    Ok(())
}

async fn sleep_jitter(range_ms: (u64, u64)) {
    let (min, max) = range_ms;
    if max == 0 {
        return;
    }
    let ms = if max > min {
        rand::Rng::gen_range(&mut rand::thread_rng(), min..=max)
    } else {
        min
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scanner_core::FinancialStatement;

    fn snap(symbol: &str, sector: &str, industry: &str, pe: f64) -> FundamentalSnapshot {
        FundamentalSnapshot {
            symbol: symbol.to_string(),
            sector: Some(sector.to_string()),
            industry: Some(industry.to_string()),
            trailing_pe: Some(pe),
            current_price: Some(100.0),
            ..Default::default()
        }
    }

    struct FixtureProvider {
        snapshots: Vec<FundamentalSnapshot>,
    }

    #[async_trait]
    impl FundamentalsProvider for FixtureProvider {
        async fn fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, ScanError> {
            self.snapshots
                .iter()
                .find(|s| s.symbol == symbol)
                .cloned()
                .ok_or_else(|| ScanError::ApiError(format!("no data for {}", symbol)))
        }

        async fn annual_financials(
            &self,
            _symbol: &str,
        ) -> Result<Vec<FinancialStatement>, ScanError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn trimmed_mean_of_constant_sequence_is_the_constant() {
        let values: Vec<Option<f64>> = vec![Some(7.0); 10];
        assert_eq!(trimmed_mean(&values), Some(7.0));
    }

    #[test]
    fn trimmed_mean_falls_back_to_plain_mean_below_three() {
        assert_eq!(trimmed_mean(&[Some(4.0), Some(6.0)]), Some(5.0));
        assert_eq!(trimmed_mean(&[Some(4.0), None]), Some(4.0));
        assert_eq!(trimmed_mean(&[None, None]), None);
        assert_eq!(trimmed_mean(&[]), None);
    }

    #[test]
    fn trimmed_mean_drops_outliers() {
        // 1..=9 plus one extreme outlier; the outlier is outside P90
        let mut values: Vec<Option<f64>> = (1..=9).map(|v| Some(v as f64)).collect();
        values.push(Some(1000.0));
        let with_outlier = trimmed_mean(&values).unwrap();
        assert!(with_outlier < 10.0, "outlier leaked into mean: {}", with_outlier);
    }

    #[test]
    fn trimmed_mean_ignores_nan() {
        let values = vec![Some(f64::NAN), Some(3.0), Some(3.0), Some(3.0)];
        assert_eq!(trimmed_mean(&values), Some(3.0));
    }

    #[test]
    fn lookup_resolves_industry_then_sector_then_market() {
        let samples = vec![
            MetricsSample {
                symbol: "A".to_string(),
                sector: "Technology".to_string(),
                industry: "Software".to_string(),
                pe: Some(30.0),
                pb: None,
                ps: None,
                peg: None,
                de: None,
                fcf_yield: None,
            },
            MetricsSample {
                symbol: "B".to_string(),
                sector: "Technology".to_string(),
                industry: "Semiconductors".to_string(),
                pe: Some(20.0),
                pb: None,
                ps: None,
                peg: None,
                de: None,
                fcf_yield: None,
            },
        ];
        let mut calc = BenchmarkCalculator::new();
        calc.rebuild_from_samples(&samples);

        // Industry hit
        let set = calc.averages_for(Some("Technology"), Some("Software"));
        assert_eq!(set.pe, Some(30.0));

        // Unknown industry falls back to sector
        let set = calc.averages_for(Some("Technology"), Some("Hardware"));
        assert_eq!(set.pe, Some(25.0));

        // Unknown sector and industry fall back to market averages
        let set = calc.averages_for(Some("Utilities"), Some("Water"));
        assert_eq!(set.pe, Some(25.0));

        // None keys skip straight to market averages
        let set = calc.averages_for(None, None);
        assert_eq!(set.pe, Some(25.0));
    }

    #[test]
    fn uninitialized_calculator_returns_hardcoded_defaults() {
        let calc = BenchmarkCalculator::new();
        let set = calc.averages_for(Some("Technology"), Some("Software"));
        assert_eq!(set, BenchmarkSet::market_defaults());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let samples: Vec<MetricsSample> = (0..20)
            .map(|i| MetricsSample {
                symbol: format!("S{}", i),
                sector: if i % 2 == 0 { "Tech" } else { "Health" }.to_string(),
                industry: format!("Ind{}", i % 4),
                pe: Some(10.0 + i as f64),
                pb: Some(1.0 + i as f64 / 10.0),
                ps: None,
                peg: Some(1.5),
                de: Some(0.8),
                fcf_yield: Some(4.0),
            })
            .collect();

        let mut a = BenchmarkCalculator::new();
        let mut b = BenchmarkCalculator::new();
        a.rebuild_from_samples(&samples);
        b.rebuild_from_samples(&samples);
        assert_eq!(a.industry_table(), b.industry_table());
        assert_eq!(a.sector_table(), b.sector_table());
        assert_eq!(
            a.averages_for(None, None),
            b.averages_for(None, None)
        );
    }

    #[tokio::test]
    async fn initialize_skips_unclassified_and_failing_tickers() {
        let mut unclassified = snap("NOSEC", "", "", 10.0);
        unclassified.sector = None;
        unclassified.industry = None;

        let provider = FixtureProvider {
            snapshots: vec![
                snap("AAA", "Technology", "Software", 30.0),
                snap("BBB", "Technology", "Software", 32.0),
                unclassified,
            ],
        };
        let tickers: Vec<String> = ["AAA", "BBB", "NOSEC", "MISSING"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut calc = BenchmarkCalculator::new();
        let config = BenchmarkConfig {
            delay_ms: (0, 0),
            ..Default::default()
        };
        let sampled = calc
            .initialize_with_sample(&provider, &tickers, &config)
            .await
            .unwrap();

        assert_eq!(sampled, 2);
        assert!(calc.is_initialized());
        let set = calc.averages_for(Some("Technology"), Some("Software"));
        assert_eq!(set.pe, Some(31.0));
    }
}
