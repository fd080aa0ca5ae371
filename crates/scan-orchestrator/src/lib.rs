use async_trait::async_trait;
use competitive_analysis::CompetitiveAnalyzer;
use dashmap::DashMap;
use growth_analysis::GrowthAnalyzer;
use indicatif::{ProgressBar, ProgressStyle};
use industry_benchmarks::{BenchmarkCalculator, BenchmarkConfig};
use scanner_core::{
    AssessmentScheme, FinancialStatement, FundamentalSnapshot, FundamentalsProvider, ScanError,
    StockValuation,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use valuation_engine::{ValuationEngine, ValuationThresholds};

pub mod output;
pub use output::write_csv;

/// Scan-wide tuning knobs.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Target benchmark sample size per sector.
    pub sample_size: usize,
    /// Cap on tickers examined during benchmark classification.
    pub classification_cap: usize,
    /// Per-request jitter delay range in milliseconds; (0, 0) disables it.
    pub delay_ms: (u64, u64),
    /// Concurrent tickers in flight during the scoring pass.
    pub concurrency: usize,
    pub scheme: AssessmentScheme,
    pub include_growth: bool,
    pub include_competitive: bool,
    pub thresholds: ValuationThresholds,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            classification_cap: 500,
            delay_ms: (250, 750),
            concurrency: 8,
            scheme: AssessmentScheme::Detailed,
            include_growth: true,
            include_competitive: true,
            thresholds: ValuationThresholds::default(),
        }
    }
}

/// Caching wrapper so the benchmark pass and the scoring pass fetch each
/// symbol at most once.
struct CachedProvider {
    inner: Arc<dyn FundamentalsProvider>,
    snapshots: Arc<DashMap<String, FundamentalSnapshot>>,
}

#[async_trait]
impl FundamentalsProvider for CachedProvider {
    async fn fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, ScanError> {
        if let Some(cached) = self.snapshots.get(symbol) {
            return Ok(cached.clone());
        }
        let snap = self.inner.fundamentals(symbol).await?;
        self.snapshots.insert(symbol.to_string(), snap.clone());
        Ok(snap)
    }

    async fn annual_financials(&self, symbol: &str) -> Result<Vec<FinancialStatement>, ScanError> {
        self.inner.annual_financials(symbol).await
    }
}

/// Wires the provider, benchmark calculator, overlay analyzers, and the
/// valuation engine into a batch scanner.
pub struct ValuationScanner {
    provider: CachedProvider,
    benchmarks: RwLock<BenchmarkCalculator>,
    growth_analyzer: GrowthAnalyzer,
    competitive_analyzer: CompetitiveAnalyzer,
    engine: ValuationEngine,
    config: ScannerConfig,
}

impl ValuationScanner {
    pub fn new(provider: Arc<dyn FundamentalsProvider>, config: ScannerConfig) -> Self {
        let engine =
            ValuationEngine::new(config.scheme).with_thresholds(config.thresholds.clone());
        Self {
            provider: CachedProvider {
                inner: provider,
                snapshots: Arc::new(DashMap::new()),
            },
            benchmarks: RwLock::new(BenchmarkCalculator::new()),
            growth_analyzer: GrowthAnalyzer::new(),
            competitive_analyzer: CompetitiveAnalyzer::new(),
            engine,
            config,
        }
    }

    /// Build the dynamic benchmark tables from a sample of the universe.
    /// Optional: without it, assessments use hardcoded market defaults.
    pub async fn initialize_benchmarks(&self, tickers: &[String]) -> Result<usize, ScanError> {
        let bench_config = BenchmarkConfig {
            sample_size: self.config.sample_size,
            classification_cap: self.config.classification_cap,
            delay_ms: self.config.delay_ms,
        };
        let mut calc = self.benchmarks.write().await;
        calc.initialize_with_sample(&self.provider, tickers, &bench_config)
            .await
    }

    /// Export the benchmark tables alongside the scan results.
    pub async fn export_benchmark_tables(
        &self,
        industry_path: &std::path::Path,
        sector_path: &std::path::Path,
    ) -> Result<(), ScanError> {
        self.benchmarks
            .read()
            .await
            .write_tables_csv(industry_path, sector_path)
    }

    /// Peers sharing the stock's industry, drawn from snapshots already
    /// fetched this scan (typically the benchmark sample).
    fn industry_peers(&self, symbol: &str, industry: &str) -> Vec<FundamentalSnapshot> {
        self.provider
            .snapshots
            .iter()
            .filter(|entry| {
                entry.key() != symbol && entry.value().industry.as_deref() == Some(industry)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Assess one ticker. `Ok(None)` means the provider had no usable data;
    /// the ticker is skipped rather than failing the batch.
    pub async fn analyze_ticker(&self, symbol: &str) -> Result<Option<StockValuation>, ScanError> {
        let snapshot = self.provider.fundamentals(symbol).await?;
        if !snapshot.has_any_data() {
            tracing::debug!("No usable data for {}, skipping", symbol);
            return Ok(None);
        }

        let benchmarks = self
            .benchmarks
            .read()
            .await
            .averages_for(snapshot.sector.as_deref(), snapshot.industry.as_deref());

        let growth = if self.config.include_growth {
            match self.provider.annual_financials(symbol).await {
                Ok(statements) if statements.len() >= 2 => {
                    Some(self.growth_analyzer.analyze(&statements))
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Error fetching statement history for {}: {}", symbol, e);
                    None
                }
            }
        } else {
            None
        };

        let competitive = if self.config.include_competitive {
            let peers = snapshot
                .industry
                .as_deref()
                .map(|industry| self.industry_peers(symbol, industry))
                .unwrap_or_default();
            Some(self.competitive_analyzer.analyze(&snapshot, &peers))
        } else {
            None
        };

        Ok(Some(self.engine.assess(
            &snapshot,
            &benchmarks,
            growth.as_ref(),
            competitive.as_ref(),
        )))
    }

    /// Scan a ticker list with bounded concurrency. Per-ticker failures are
    /// logged and dropped; results come back sorted by score, best first.
    pub async fn scan(self: &Arc<Self>, tickers: &[String]) -> Vec<StockValuation> {
        let progress = ProgressBar::new(tickers.len() as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut results = Vec::new();
        let mut tasks = JoinSet::new();
        let mut pending = tickers.iter().cloned();

        loop {
            while tasks.len() < self.config.concurrency {
                let Some(symbol) = pending.next() else {
                    break;
                };
                let scanner = Arc::clone(self);
                tasks.spawn(async move {
                    let result = scanner.analyze_ticker(&symbol).await;
                    (symbol, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            progress.inc(1);

            match joined {
                Ok((symbol, Ok(Some(valuation)))) => {
                    progress.set_message(symbol);
                    results.push(valuation);
                }
                Ok((symbol, Ok(None))) => {
                    tracing::debug!("Skipped {} (no data)", symbol);
                }
                Ok((symbol, Err(e))) => {
                    tracing::warn!("Failed to analyze {}: {}", symbol, e);
                }
                Err(e) => {
                    tracing::error!("Task error: {}", e);
                }
            }
        }

        progress.finish_and_clear();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }
}
