// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use indexmap::IndexMap;
use std::sync::RwLock;

/// A sink for the counters of the backend.
#[cfg_attr(test, mockall::automock)]
pub trait StatsCollector {
    fn inc_value(&self, key: &str, amount: u64);
    fn set_value(&self, key: &str, value: u64);
}

/// Keeps the counters in memory.
#[derive(Debug, Default)]
pub struct MemoryStats {
    values: RwLock<IndexMap<String, u64>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        match self.values.read() {
            Ok(values) => values.get(key).copied(),
            Err(poisoned) => poisoned.into_inner().get(key).copied(),
        }
    }

    /// A copy of all counters in insertion order.
    pub fn snapshot(&self) -> IndexMap<String, u64> {
        match self.values.read() {
            Ok(values) => values.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatsCollector for MemoryStats {
    fn inc_value(&self, key: &str, amount: u64) {
        let mut values = self.values.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let value = values.entry(key.to_string()).or_default();
        *value = value.saturating_add(amount);
    }

    fn set_value(&self, key: &str, value: u64) {
        let mut values = self.values.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        values.insert(key.to_string(), value);
    }
}

/// The keys used for the stats.
pub struct StatKeys;

impl StatKeys {
    pub fn producer(frontier: &str) -> String {
        format!("hcf/producer/{frontier}")
    }

    pub fn producer_slot(frontier: &str, slot: &str) -> String {
        format!("hcf/producer/{frontier}/{slot}")
    }

    pub fn consumer(frontier: &str, slot: &str) -> String {
        format!("hcf/consumer/{frontier}/{slot}")
    }

    pub fn consumer_requests(frontier: &str, slot: &str) -> String {
        format!("hcf/consumer/{frontier}/{slot}/requests")
    }

    pub fn consumer_batches(frontier: &str, slot: &str) -> String {
        format!("hcf/consumer/{frontier}/{slot}/batches")
    }
}

#[cfg(test)]
mod test {
    use crate::stats::{MemoryStats, StatKeys, StatsCollector};
    use std::sync::Arc;

    #[test]
    fn memory_stats_count() {
        let stats = Arc::new(MemoryStats::new());
        stats.set_value("a", 0);
        stats.inc_value("a", 3);
        stats.inc_value("b", 1);
        stats.inc_value("a", 1);
        assert_eq!(Some(4), stats.get("a"));
        assert_eq!(None, stats.get("c"));
        let snapshot = stats.snapshot();
        assert_eq!(vec!["a", "b"], snapshot.keys().collect::<Vec<_>>());
        stats.set_value("a", 1);
        assert_eq!(Some(1), stats.get("a"));
    }

    #[test]
    fn keys_are_structured() {
        assert_eq!("hcf/producer/links", StatKeys::producer("links"));
        assert_eq!("hcf/producer/links/s3", StatKeys::producer_slot("links", "s3"));
        assert_eq!("hcf/consumer/links/0", StatKeys::consumer("links", "0"));
        assert_eq!("hcf/consumer/links/0/requests", StatKeys::consumer_requests("links", "0"));
        assert_eq!("hcf/consumer/links/0/batches", StatKeys::consumer_batches("links", "0"));
    }
}
