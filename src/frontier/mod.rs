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

//! The remote side of the backend: a named frontier, partitioned into slots, shared by
//! many crawl processes.

mod errors;
mod hubstorage;
mod manager;
mod record;
mod retry;
mod service;

pub use errors::*;
pub use hubstorage::HubstorageFrontier;
pub use manager::{AddOutcome, DeleteOutcome, FrontierManager, ReadOutcome};
pub use record::{Batch, BatchId, FrontierRecord, QueueItem};
pub use retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use service::{ErrorClass, FrontierService};
