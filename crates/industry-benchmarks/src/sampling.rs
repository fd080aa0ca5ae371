use std::collections::{BTreeMap, HashMap};

/// Classification pass output: tickers grouped by sector and industry,
/// preserving first-seen order within each industry.
#[derive(Debug, Default)]
pub struct SamplePlan {
    sectors: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    classifications: HashMap<String, (String, String)>,
}

impl SamplePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ticker: &str, sector: &str, industry: &str) {
        self.sectors
            .entry(sector.to_string())
            .or_default()
            .entry(industry.to_string())
            .or_default()
            .push(ticker.to_string());
        self.classifications
            .insert(ticker.to_string(), (sector.to_string(), industry.to_string()));
    }

    pub fn classification(&self, ticker: &str) -> Option<(String, String)> {
        self.classifications.get(ticker).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty()
    }
}

/// Pick sample tickers per sector, splitting `sample_size` across that
/// sector's industries with a 5..=20 cap per industry so large sectors do
/// not drown out small ones.
pub fn select_sample(plan: &SamplePlan, sample_size: usize) -> Vec<String> {
    let mut sample = Vec::new();
    for industries in plan.sectors.values() {
        let per_industry = (sample_size / industries.len().max(1)).clamp(5, 20);
        for tickers in industries.values() {
            sample.extend(tickers.iter().take(per_industry).cloned());
        }
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with(industries: &[(&str, &str, usize)]) -> SamplePlan {
        let mut plan = SamplePlan::new();
        for (sector, industry, count) in industries {
            for i in 0..*count {
                plan.add(&format!("{}-{}", industry, i), sector, industry);
            }
        }
        plan
    }

    #[test]
    fn per_industry_cap_is_bounded_between_5_and_20() {
        // 25 industries in one sector: 100/25 = 4, clamped up to 5
        let mut plan = SamplePlan::new();
        for ind in 0..25 {
            for i in 0..10 {
                plan.add(&format!("T{}-{}", ind, i), "Tech", &format!("Ind{}", ind));
            }
        }
        let sample = select_sample(&plan, 100);
        assert_eq!(sample.len(), 25 * 5);

        // 2 industries: 100/2 = 50, clamped down to 20
        let plan = plan_with(&[("Tech", "Software", 30), ("Tech", "Hardware", 30)]);
        let sample = select_sample(&plan, 100);
        assert_eq!(sample.len(), 40);
    }

    #[test]
    fn small_industries_contribute_all_their_tickers() {
        let plan = plan_with(&[("Health", "Biotech", 3)]);
        let sample = select_sample(&plan, 100);
        assert_eq!(sample.len(), 3);
    }

    #[test]
    fn classification_round_trips() {
        let plan = plan_with(&[("Tech", "Software", 1)]);
        assert_eq!(
            plan.classification("Software-0"),
            Some(("Tech".to_string(), "Software".to_string()))
        );
        assert_eq!(plan.classification("UNKNOWN"), None);
    }
}
