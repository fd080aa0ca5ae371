use scanner_core::{CompetitiveMetrics, FundamentalSnapshot};

/// Analyzes a company's competitive position: a standalone economic-moat
/// score plus metrics relative to industry peers when a peer set is
/// available.
pub struct CompetitiveAnalyzer;

impl CompetitiveAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Full competitive metrics. With an empty peer set only the moat score
    /// is populated.
    pub fn analyze(
        &self,
        company: &FundamentalSnapshot,
        peers: &[FundamentalSnapshot],
    ) -> CompetitiveMetrics {
        let mut metrics = CompetitiveMetrics {
            peer_count: peers.len(),
            moat_score: self.moat_score(company),
            ..Default::default()
        };

        if peers.is_empty() {
            return metrics;
        }

        if let Some(cap) = company.market_cap {
            let peer_caps: f64 = peers.iter().filter_map(|p| p.market_cap).sum();
            let total = peer_caps + cap;
            if total > 0.0 {
                metrics.market_share = Some(cap / total * 100.0);
            }
        }

        metrics.relative_pe = relative(company.effective_pe(), peer_median(peers, |p| p.effective_pe()));
        metrics.relative_margins =
            relative(company.profit_margin, peer_median(peers, |p| p.profit_margin));
        metrics.relative_roe = relative(
            company.return_on_equity,
            peer_median(peers, |p| p.return_on_equity),
        );
        metrics.relative_growth = relative(
            company.earnings_growth,
            peer_median(peers, |p| p.earnings_growth),
        );

        metrics
    }

    /// Heuristic economic-moat score on a 0-5 scale. Gross margin, ROE,
    /// profit margin, and market cap each contribute 0-2 points; the sum is
    /// averaged over the factors present and rescaled.
    pub fn moat_score(&self, snap: &FundamentalSnapshot) -> Option<f64> {
        let mut score = 0u32;
        let mut factors = 0u32;

        // Margins and ROE arrive as fractions (0.50 = 50%)
        if let Some(gm) = snap.gross_margin {
            factors += 1;
            if gm > 0.50 {
                score += 2;
            } else if gm > 0.35 {
                score += 1;
            }
        }

        if let Some(roe) = snap.return_on_equity {
            factors += 1;
            if roe > 0.25 {
                score += 2;
            } else if roe > 0.15 {
                score += 1;
            }
        }

        if let Some(pm) = snap.profit_margin {
            factors += 1;
            if pm > 0.20 {
                score += 2;
            } else if pm > 0.10 {
                score += 1;
            }
        }

        if let Some(cap) = snap.market_cap {
            factors += 1;
            if cap > 100e9 {
                score += 2;
            } else if cap > 10e9 {
                score += 1;
            }
        }

        if factors == 0 {
            return None;
        }
        let normalized = score as f64 / factors as f64 * 5.0;
        Some((normalized * 10.0).round() / 10.0)
    }
}

impl Default for CompetitiveAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn relative(company: Option<f64>, peer_median: Option<f64>) -> Option<f64> {
    match (company, peer_median) {
        (Some(c), Some(m)) if m != 0.0 => Some(c / m),
        _ => None,
    }
}

fn peer_median(
    peers: &[FundamentalSnapshot],
    field: impl Fn(&FundamentalSnapshot) -> Option<f64>,
) -> Option<f64> {
    let mut values: Vec<f64> = peers
        .iter()
        .filter_map(&field)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
