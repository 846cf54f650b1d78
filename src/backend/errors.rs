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

use crate::frontier::FrontierError;
use crate::queue::DiskQueueError;
use crate::slots::SlotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("The link {0} is frontier bound but the backend is not configured as producer.")]
    ProducerNotConfigured(String),
    #[error("The backend is not configured as consumer.")]
    ConsumerNotConfigured,
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Frontier(#[from] FrontierError),
    #[error(transparent)]
    DiskQueue(#[from] DiskQueueError),
}
