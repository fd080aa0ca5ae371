use scanner_core::{ScanError, StockValuation};
use std::path::Path;

/// Write scan results as a flat CSV report, one row per stock.
pub fn write_csv(results: &[StockValuation], path: &Path) -> Result<(), ScanError> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| ScanError::OutputError(e.to_string()))?;

    for valuation in results {
        writer
            .serialize(valuation)
            .map_err(|e| ScanError::OutputError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ScanError::OutputError(e.to_string()))?;

    tracing::info!("Wrote {} rows to {}", results.len(), path.display());
    Ok(())
}

/// Print a short table of the top results to stdout.
pub fn print_summary(results: &[StockValuation], limit: usize) {
    if results.is_empty() {
        println!("No results to display.");
        return;
    }

    println!(
        "{:<8} {:<28} {:>8} {:>8} {:>8} {:>7}  {}",
        "Ticker", "Name", "P/E", "P/B", "P/S", "Score", "Assessment"
    );
    for valuation in results.iter().take(limit) {
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".into());
        let name: String = valuation.name.chars().take(28).collect();
        println!(
            "{:<8} {:<28} {:>8} {:>8} {:>8} {:>7.1}  {}",
            valuation.symbol,
            name,
            fmt(valuation.pe),
            fmt(valuation.pb),
            fmt(valuation.ps),
            valuation.score,
            valuation.assessment
        );
    }
}
