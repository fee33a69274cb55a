//! Per-operation outcome counters for bridge calls

use std::collections::HashMap;

/// Successful and failed invocations of one API operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallTally {
    pub ok: u64,
    pub failed: u64,
}

impl CallTally {
    pub fn total(&self) -> u64 {
        self.ok + self.failed
    }
}

pub struct CallCounter {
    tallies: HashMap<&'static str, CallTally>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self {
            tallies: HashMap::new(),
        }
    }

    pub fn record(&mut self, op: &'static str, ok: bool) {
        let tally = self.tallies.entry(op).or_default();
        if ok {
            tally.ok += 1;
        } else {
            tally.failed += 1;
        }
    }

    pub fn get(&self, op: &str) -> CallTally {
        self.tallies.get(op).copied().unwrap_or_default()
    }

    pub fn total_failed(&self) -> u64 {
        self.tallies.values().map(|t| t.failed).sum()
    }

    pub fn reset(&mut self) {
        self.tallies.clear();
    }

    /// Operations sorted by name, for stable reporting.
    pub fn sorted(&self) -> Vec<(&'static str, CallTally)> {
        let mut out: Vec<_> = self.tallies.iter().map(|(k, v)| (*k, *v)).collect();
        out.sort_unstable_by_key(|(k, _)| *k);
        out
    }
}

impl Default for CallCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_splits_outcomes() {
        let mut counter = CallCounter::new();
        counter.record("dataref.getInt", true);
        counter.record("dataref.getInt", false);
        counter.record("dataref.getInt", true);
        counter.record("scenery.loadObject", false);

        assert_eq!(counter.get("dataref.getInt"), CallTally { ok: 2, failed: 1 });
        assert_eq!(counter.get("dataref.getInt").total(), 3);
        assert_eq!(counter.total_failed(), 2);
        assert_eq!(counter.get("instance.create"), CallTally::default());

        let names: Vec<_> = counter.sorted().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["dataref.getInt", "scenery.loadObject"]);
    }
}
