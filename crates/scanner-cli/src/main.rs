use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use market_data::{NasdaqTickerSource, YahooClient};
use scan_orchestrator::{output, ScannerConfig, ValuationScanner};
use scanner_core::{AssessmentScheme, TickerSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scanner-cli", about = "Heuristic equity valuation screener")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the NASDAQ universe: build benchmark tables from a sample,
    /// score every ticker, and write a CSV report.
    Scan(ScanArgs),
    /// Assess specific symbols against hardcoded market benchmarks.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Target benchmark sample size per sector
    #[arg(long, default_value_t = 100)]
    sample_size: usize,

    /// Cap the number of tickers scanned (0 = whole universe)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Output CSV path
    #[arg(long, default_value = "nasdaq_valuation_scan.csv")]
    output: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Ticker symbols to assess
    #[arg(required = true)]
    symbols: Vec<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Use the three-tier +/-2 label scheme instead of the five-tier one
    #[arg(long)]
    simple_labels: bool,

    /// Skip the growth-trend overlay
    #[arg(long)]
    no_growth: bool,

    /// Skip the competitive-moat overlay
    #[arg(long)]
    no_moat: bool,

    /// Concurrent tickers in flight
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
}

impl CommonArgs {
    fn to_config(&self) -> ScannerConfig {
        ScannerConfig {
            concurrency: self.concurrency.max(1),
            scheme: if self.simple_labels {
                AssessmentScheme::Simple
            } else {
                AssessmentScheme::Detailed
            },
            include_growth: !self.no_growth,
            include_competitive: !self.no_moat,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan(args) => scan(args).await,
        Command::Analyze(args) => analyze(args).await,
    }
}

async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let mut config = args.common.to_config();
    config.sample_size = args.sample_size;

    let provider = Arc::new(YahooClient::new());
    let scanner = Arc::new(ValuationScanner::new(provider, config));

    let mut tickers = NasdaqTickerSource::new()
        .tickers()
        .await
        .context("fetching NASDAQ ticker list")?;
    if args.limit > 0 {
        tickers.truncate(args.limit);
    }

    tracing::info!("Scanning {} NASDAQ companies", tickers.len());

    let sampled = scanner
        .initialize_benchmarks(&tickers)
        .await
        .context("building benchmark tables")?;
    tracing::info!("Benchmark tables built from {} sampled companies", sampled);

    scanner
        .export_benchmark_tables(
            std::path::Path::new("industry_averages.csv"),
            std::path::Path::new("sector_averages.csv"),
        )
        .await
        .context("exporting benchmark tables")?;

    let results = scanner.scan(&tickers).await;
    if results.is_empty() {
        tracing::warn!("Scan completed but no valid results were obtained");
        return Ok(());
    }

    output::write_csv(&results, &args.output).context("writing scan report")?;
    println!("\nScan complete! Results saved to '{}'", args.output.display());

    println!("\nSample results:");
    output::print_summary(&results, 10);
    Ok(())
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = args.common.to_config();
    let provider = Arc::new(YahooClient::new());
    let scanner = Arc::new(ValuationScanner::new(provider, config));

    let symbols: Vec<String> = args.symbols.iter().map(|s| s.to_uppercase()).collect();
    let results = scanner.scan(&symbols).await;

    if results.is_empty() {
        anyhow::bail!("No data available for the requested symbols");
    }
    output::print_summary(&results, results.len());
    Ok(())
}
