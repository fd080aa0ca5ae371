use serde::{Deserialize, Serialize};

/// Undervalued/overvalued bounds for one metric. For the ratio metrics these
/// are multipliers applied to the benchmark; for the fallback FCF-yield and
/// debt/equity checks they are absolute values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricThresholds {
    pub undervalued: f64,
    pub overvalued: f64,
}

/// Per-metric valuation thresholds. Deserializable so a scan can override
/// the defaults from a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationThresholds {
    pub pe: MetricThresholds,
    pub pb: MetricThresholds,
    pub ps: MetricThresholds,
    pub peg: MetricThresholds,
    /// Absolute FCF-yield percentages, used when no benchmark yield exists.
    pub fcf_yield: MetricThresholds,
    /// Absolute debt/equity bounds, used when no benchmark exists.
    pub de: MetricThresholds,
}

impl Default for ValuationThresholds {
    fn default() -> Self {
        Self {
            pe: MetricThresholds { undervalued: 0.8, overvalued: 1.2 },
            pb: MetricThresholds { undervalued: 0.7, overvalued: 1.3 },
            ps: MetricThresholds { undervalued: 0.7, overvalued: 1.3 },
            peg: MetricThresholds { undervalued: 0.8, overvalued: 1.2 },
            fcf_yield: MetricThresholds { undervalued: 5.0, overvalued: 2.0 },
            de: MetricThresholds { undervalued: 0.5, overvalued: 2.0 },
        }
    }
}
