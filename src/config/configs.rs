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

use crate::config::hubstorage::HubstorageConfig;
use crate::config::roles::{ConsumerConfig, ProducerConfig};
use crate::config::system::SystemConfig;
use crate::frontier::RetryPolicy;
use crate::queue::DEFAULT_MAX_ELEMENT_SIZE;
use camino::{Utf8Path, Utf8PathBuf};
use config::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MEMORY_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_MAX_NEXT_REQUESTS: usize = 1000;

/// All settings of the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename(serialize = "Config"))]
#[serde(default)]
pub struct HcfConfig {
    pub system: SystemConfig,
    pub hubstorage: HubstorageConfig,
    /// Set to write links to a frontier.
    pub producer: Option<ProducerConfig>,
    /// Set to read links from a frontier.
    pub consumer: Option<ConsumerConfig>,
    /// Max size of the memory queue. Only enforced if a disk queue is configured.
    pub memory_queue_size: usize,
    /// The overflow queue for the memory queue.
    pub disk_queue: Option<DiskQueueConfig>,
    /// How many requests the host asks for on each call. Small values result in many small
    /// reads from the frontier, big values can overshoot the consumer limits.
    pub max_next_requests: usize,
    pub retry: RetryConfig,
}

impl Default for HcfConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            hubstorage: HubstorageConfig::default(),
            producer: None,
            consumer: None,
            memory_queue_size: DEFAULT_MEMORY_QUEUE_SIZE,
            disk_queue: None,
            max_next_requests: DEFAULT_MAX_NEXT_REQUESTS,
            retry: RetryConfig::default(),
        }
    }
}

impl HcfConfig {
    /// The producer role, if one with a frontier name is configured.
    pub fn producer_role(&self) -> Option<&ProducerConfig> {
        self.producer
            .as_ref()
            .filter(|producer| !producer.frontier.is_empty())
    }

    /// The consumer role, if one with a frontier name is configured.
    pub fn consumer_role(&self) -> Option<&ConsumerConfig> {
        self.consumer
            .as_ref()
            .filter(|consumer| !consumer.frontier.is_empty())
    }

    pub fn load_from<P: AsRef<Utf8Path>>(folder: P) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("./hcf").required(false))
            .add_source(config::File::with_name(folder.as_ref().join("hcf").as_str()).required(false))
            .add_source(config::File::with_name(folder.as_ref().join("config").as_str()).required(false))
            .add_source(config::Environment::with_prefix("HCF").separator("."))
            .build()?
            .try_deserialize()
    }

    pub fn discover_or_default() -> Result<Self, config::ConfigError> {
        match Self::discover() {
            Ok(value) => Ok(value),
            Err(err) => {
                log::debug!("No usable config found, falling back to the defaults: {err}");
                Ok(Default::default())
            }
        }
    }

    pub fn discover() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("./hcf").required(false))
            .add_source(config::File::with_name("./hcf_data/hcf").required(false))
            .add_source(config::Environment::with_prefix("HCF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Settings of the overflow disk queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename(serialize = "DiskQueue"))]
pub struct DiskQueueConfig {
    /// The queue file. A fresh file in the temp dir if not set.
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,
    /// Max size of a single encoded request in bytes.
    #[serde(default = "_default_max_element_size")]
    pub max_element_size: usize,
}

const fn _default_max_element_size() -> usize {
    DEFAULT_MAX_ELEMENT_SIZE
}

impl Default for DiskQueueConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_element_size: _default_max_element_size(),
        }
    }
}

/// The retry settings for frontier reads and deletes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename(serialize = "Retry"))]
pub struct RetryConfig {
    #[serde(default = "_default_max_attempts")]
    pub max_attempts: u32,
    /// The wait after the first failure in seconds, grows linear with every failure.
    #[serde(default = "_default_base_delay_secs")]
    pub base_delay_secs: u64,
}

const fn _default_max_attempts() -> u32 {
    crate::frontier::DEFAULT_MAX_ATTEMPTS
}
const fn _default_base_delay_secs() -> u64 {
    crate::frontier::DEFAULT_BASE_DELAY.as_secs()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: _default_max_attempts(),
            base_delay_secs: _default_base_delay_secs(),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(value: RetryConfig) -> Self {
        RetryPolicy::new(value.max_attempts, Duration::from_secs(value.base_delay_secs))
    }
}
