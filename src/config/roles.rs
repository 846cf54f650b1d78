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

use serde::{Deserialize, Serialize};

pub const DEFAULT_PRODUCER_NUMBER_OF_SLOTS: u64 = 8;
pub const DEFAULT_PRODUCER_SLOT_PREFIX: &str = "";
pub const DEFAULT_PRODUCER_BATCH_SIZE: u64 = 10000;
pub const DEFAULT_CONSUMER_SLOT: &str = "0";
pub const DEFAULT_CONSUMER_MAX_BATCHES: u64 = 0;
pub const DEFAULT_CONSUMER_MAX_REQUESTS: u64 = 0;

/// Configures this process as producer, writing new links to the frontier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename(serialize = "Producer"))]
pub struct ProducerConfig {
    /// The frontier where links are written.
    pub frontier: String,
    /// Prefix of the slot names.
    #[serde(default = "_default_slot_prefix")]
    pub slot_prefix: String,
    /// Number of slots the links are spread over.
    #[serde(default = "_default_number_of_slots")]
    pub number_of_slots: u64,
    /// A slot is flushed as soon as this many links wait for it. 0 disables the auto flush.
    #[serde(default = "_default_batch_size")]
    pub batch_size: u64,
}

fn _default_slot_prefix() -> String {
    DEFAULT_PRODUCER_SLOT_PREFIX.to_string()
}
const fn _default_number_of_slots() -> u64 {
    DEFAULT_PRODUCER_NUMBER_OF_SLOTS
}
const fn _default_batch_size() -> u64 {
    DEFAULT_PRODUCER_BATCH_SIZE
}

impl ProducerConfig {
    pub fn new(frontier: impl Into<String>) -> Self {
        Self {
            frontier: frontier.into(),
            slot_prefix: _default_slot_prefix(),
            number_of_slots: _default_number_of_slots(),
            batch_size: _default_batch_size(),
        }
    }

    /// The slot range for humans, `prefix[0-7]` or `prefix0`.
    pub fn slots_description(&self) -> String {
        if self.number_of_slots > 1 {
            format!("{}[0-{}]", self.slot_prefix, self.number_of_slots - 1)
        } else {
            format!("{}0", self.slot_prefix)
        }
    }
}

/// Configures this process as consumer, reading links from a frontier slot.
///
/// Reading stops as soon as any of the limits is reached. A limit of 0 means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename(serialize = "Consumer"))]
pub struct ConsumerConfig {
    /// The frontier where links are read.
    pub frontier: String,
    /// The slot this process reads from.
    #[serde(default = "_default_consumer_slot")]
    pub slot: String,
    /// Max batches to read in this run.
    #[serde(default = "_default_max_batches")]
    pub max_batches: u64,
    /// Max requests to read in this run.
    #[serde(default = "_default_max_requests")]
    pub max_requests: u64,
}

fn _default_consumer_slot() -> String {
    DEFAULT_CONSUMER_SLOT.to_string()
}
const fn _default_max_batches() -> u64 {
    DEFAULT_CONSUMER_MAX_BATCHES
}
const fn _default_max_requests() -> u64 {
    DEFAULT_CONSUMER_MAX_REQUESTS
}

impl ConsumerConfig {
    pub fn new(frontier: impl Into<String>) -> Self {
        Self {
            frontier: frontier.into(),
            slot: _default_consumer_slot(),
            max_batches: _default_max_batches(),
            max_requests: _default_max_requests(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::config::ProducerConfig;

    #[test]
    fn describes_the_slots() {
        let mut config = ProducerConfig::new("links");
        config.slot_prefix = "s".to_string();
        assert_eq!("s[0-7]", config.slots_description());
        config.number_of_slots = 1;
        assert_eq!("s0", config.slots_description());
    }
}
