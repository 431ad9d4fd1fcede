use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory response status counts keyed by forwarding target.
///
/// Shows where requests actually went, which is the interesting signal for a
/// proxy whose target changes underneath it.
#[derive(Debug, Default)]
pub struct Metrics {
    counts: Mutex<HashMap<String, HashMap<u16, u64>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a response status for the target a request was forwarded to.
    pub fn record(&self, target: &str, status: u16) {
        let mut guard = self.counts.lock().expect("metrics store poisoned");
        *guard
            .entry(target.to_owned())
            .or_default()
            .entry(status)
            .or_insert(0) += 1;
    }

    /// Status counts for one target. Empty when the target never served a
    /// request.
    pub fn for_target(&self, target: &str) -> HashMap<u16, u64> {
        self.counts
            .lock()
            .expect("metrics store poisoned")
            .get(target)
            .cloned()
            .unwrap_or_default()
    }

    /// Every target that served at least one request, sorted.
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<_> = self
            .counts
            .lock()
            .expect("metrics store poisoned")
            .keys()
            .cloned()
            .collect();
        targets.sort();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_counts_per_target_and_status() {
        let metrics = Metrics::new();
        metrics.record("10.0.0.5:80", 200);
        metrics.record("10.0.0.5:80", 200);
        metrics.record("10.0.0.5:80", 502);
        metrics.record("10.0.0.6:80", 200);

        let counts = metrics.for_target("10.0.0.5:80");
        assert_eq!(counts.get(&200), Some(&2));
        assert_eq!(counts.get(&502), Some(&1));
        assert_eq!(metrics.for_target("10.0.0.6:80").get(&200), Some(&1));
    }

    #[test]
    fn unknown_target_has_no_counts() {
        let metrics = Metrics::new();
        assert!(metrics.for_target("10.0.0.9:80").is_empty());
    }

    #[test]
    fn targets_are_sorted() {
        let metrics = Metrics::new();
        metrics.record("10.0.0.6:80", 200);
        metrics.record("10.0.0.5:80", 200);
        assert_eq!(metrics.targets(), vec!["10.0.0.5:80", "10.0.0.6:80"]);
    }
}
