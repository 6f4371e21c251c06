//! Measurement feed for `sync-kpi-data`.
//!
//! Sync pulls `(module, kpi, value)` samples from a [`MeasurementFeed`] and
//! records each one. [`StaticFeed`] is the built-in source; an external
//! collector can be plugged in behind the same trait.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSample {
    pub module_name: String,
    pub kpi_name: String,
    pub value: f64,
}

impl FeedSample {
    pub fn new(module_name: &str, kpi_name: &str, value: f64) -> Self {
        Self {
            module_name: module_name.to_string(),
            kpi_name: kpi_name.to_string(),
            value,
        }
    }
}

/// A source of KPI samples for one company.
pub trait MeasurementFeed: Send + Sync {
    fn samples(&self, company_id: &str) -> Vec<FeedSample>;

    /// Value recorded as `measurement_source` on synced rows.
    fn source_name(&self) -> &str {
        "kpi_sync"
    }
}

/// A fixed list of samples, identical for every company.
#[derive(Debug, Clone)]
pub struct StaticFeed {
    samples: Vec<FeedSample>,
}

impl StaticFeed {
    pub fn new(samples: Vec<FeedSample>) -> Self {
        Self { samples }
    }
}

impl Default for StaticFeed {
    fn default() -> Self {
        Self::new(vec![
            FeedSample::new("Payroll", "Payroll Accuracy %", 99.2),
            FeedSample::new("Payroll", "Processing Time (hours)", 4.5),
            FeedSample::new("GOSI Integration", "Compliance Rate", 98.7),
            FeedSample::new("GOSI Integration", "Sync Latency (ms)", 320.0),
            FeedSample::new("Recruitment", "Time to Hire (days)", 28.0),
            FeedSample::new("Attendance", "Attendance Accuracy", 96.4),
        ])
    }
}

impl MeasurementFeed for StaticFeed {
    fn samples(&self, _company_id: &str) -> Vec<FeedSample> {
        self.samples.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_feed_is_company_independent() {
        let feed = StaticFeed::default();
        assert_eq!(feed.samples("a"), feed.samples("b"));
        assert_eq!(feed.samples("a").len(), 6);
        assert_eq!(feed.source_name(), "kpi_sync");
    }
}
