use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct MetricEntry {
    sum: f64,
    count: usize,
}

/// Named running metrics, shared by reference between an evaluation loop and
/// whatever reports its progress. Entries are created on first push.
#[derive(Debug, Default)]
pub struct RunningAverage {
    entries: RwLock<HashMap<String, MetricEntry>>,
}

impl RunningAverage {
    pub fn new() -> Self {
        RunningAverage {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn push(&self, name: &str, value: f64) {
        let mut entries = self.entries.write().unwrap();
        let entry = entries.entry(name.to_string()).or_default();
        entry.sum += value;
        entry.count += 1;
    }

    /// Mean of everything pushed so far, `None` before the first push.
    pub fn sample(&self, name: &str) -> Option<f64> {
        let entries = self.entries.read().unwrap();
        entries.get(name).and_then(|entry| {
            (entry.count > 0).then(|| entry.sum / entry.count as f64)
        })
    }

    pub fn sum(&self, name: &str) -> f64 {
        let entries = self.entries.read().unwrap();
        entries.get(name).map(|entry| entry.sum).unwrap_or(0.0)
    }

    pub fn count(&self, name: &str) -> usize {
        let entries = self.entries.read().unwrap();
        entries.get(name).map(|entry| entry.count).unwrap_or(0)
    }

    pub fn get_all_averages(&self) -> HashMap<String, Option<f64>> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    (entry.count > 0).then(|| entry.sum / entry.count as f64),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metric_has_no_sample() {
        let avg = RunningAverage::new();
        assert_eq!(avg.sample("acc1"), None);
        assert_eq!(avg.count("acc1"), 0);
        assert_eq!(avg.sum("acc1"), 0.0);
    }

    #[test]
    fn push_accumulates_sum_and_count() {
        let avg = RunningAverage::new();
        avg.push("acc1", 1.0);
        avg.push("acc1", 0.0);
        avg.push("acc1", 1.0);
        assert_eq!(avg.count("acc1"), 3);
        assert_eq!(avg.sum("acc1"), 2.0);
        assert_eq!(avg.sample("acc1"), Some(2.0 / 3.0));
    }

    #[test]
    fn metrics_are_independent() {
        let avg = RunningAverage::new();
        avg.push("acc1", 1.0);
        avg.push("acc5", 0.0);
        assert_eq!(avg.sample("acc1"), Some(1.0));
        assert_eq!(avg.sample("acc5"), Some(0.0));

        let all = avg.get_all_averages();
        assert_eq!(all.len(), 2);
        assert_eq!(all["acc1"], Some(1.0));
    }
}
