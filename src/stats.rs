use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-dataset outcome of a chunked containment join.
#[derive(Debug, Default, Serialize)]
pub struct LocateStats {
    pub timestamp: DateTime<Utc>,
    pub dataset: Option<String>,

    pub input_points: usize,
    pub located: usize,
    pub unmatched: usize,

    pub chunks: usize,
    pub chunksize: usize,
}

impl LocateStats {
    pub fn new(input_points: usize, located: usize, chunks: usize, chunksize: usize) -> Self {
        LocateStats {
            timestamp: Utc::now(),
            dataset: None,
            input_points,
            located,
            unmatched: input_points.saturating_sub(located),
            chunks,
            chunksize,
        }
    }

    /// Tag the stats with the dataset they describe.
    pub fn with_dataset(mut self, dataset: &str) -> Self {
        self.dataset = Some(dataset.to_string());
        self
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn located_pct(&self) -> f64 {
        Self::pct(self.located, self.input_points)
    }

    pub fn unmatched_pct(&self) -> f64 {
        Self::pct(self.unmatched, self.input_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(LocateStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(LocateStats::pct(50, 100), 50.0);
        assert_eq!(LocateStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_new_computes_unmatched() {
        let stats = LocateStats::new(100, 75, 2, 50);
        assert_eq!(stats.unmatched, 25);
        assert_eq!(stats.located_pct(), 75.0);
        assert_eq!(stats.unmatched_pct(), 25.0);
    }

    #[test]
    fn test_unmatched_saturates_when_join_duplicates() {
        // Overlapping polygons can yield more located rows than input points.
        let stats = LocateStats::new(10, 12, 1, 10);
        assert_eq!(stats.unmatched, 0);
    }

    #[test]
    fn test_with_dataset() {
        let stats = LocateStats::new(1, 1, 1, 1).with_dataset("grid");
        assert_eq!(stats.dataset.as_deref(), Some("grid"));
    }
}
