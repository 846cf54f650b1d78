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

use crate::config::{ConsumerConfig, DiskQueueConfig, HcfConfig, ProducerConfig};

pub fn create_example_config() -> HcfConfig {
    let mut config = HcfConfig::default();
    config.hubstorage.auth = Some("<your api key>".to_string());
    config.hubstorage.project_id = Some("12345".to_string());
    config.producer = Some(ProducerConfig {
        frontier: "links".to_string(),
        slot_prefix: "s".to_string(),
        number_of_slots: 8,
        batch_size: 1000,
    });
    config.consumer = Some(ConsumerConfig {
        frontier: "links".to_string(),
        slot: "s0".to_string(),
        max_batches: 150,
        max_requests: 0,
    });
    config.disk_queue = Some(DiskQueueConfig {
        path: Some("hcf_data/queue".into()),
        ..DiskQueueConfig::default()
    });
    config
}
