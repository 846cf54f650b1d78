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

use crate::frontier::record::{Batch, BatchId, FrontierRecord};
use std::error::Error;

/// Classification of service errors for retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts, connection failures and other transport problems. Worth retrying.
    Transient,
    /// Everything else.
    Permanent,
}

/// The remote queue service holding the frontiers.
///
/// Writes may be buffered by the implementation until [FrontierService::flush] or
/// [FrontierService::flush_slot] is called.
pub trait FrontierService {
    type Error: Error + Send + Sync + 'static;

    /// Adds `records` to the write buffer of `frontier/slot`.
    ///
    /// A failed add keeps none of the `records`, so the call can be repeated.
    async fn add(
        &mut self,
        frontier: &str,
        slot: &str,
        records: &[FrontierRecord],
    ) -> Result<(), Self::Error>;

    /// Flushes all write buffers. Records that could not be written stay buffered.
    async fn flush(&mut self) -> Result<(), Self::Error>;

    /// Flushes the write buffer of `frontier/slot`. Records that could not be written stay buffered.
    async fn flush_slot(&mut self, frontier: &str, slot: &str) -> Result<(), Self::Error>;

    /// Reads batches holding at least `mincount` items if available.
    async fn read(
        &mut self,
        frontier: &str,
        slot: &str,
        mincount: Option<usize>,
    ) -> Result<Vec<Batch>, Self::Error>;

    /// Deletes consumed batches.
    async fn delete(&mut self, frontier: &str, slot: &str, ids: &[BatchId]) -> Result<(), Self::Error>;

    /// Deletes the whole slot.
    async fn delete_slot(&mut self, frontier: &str, slot: &str) -> Result<(), Self::Error>;

    /// Releases the connection. Must be fine to call without any prior request.
    async fn close(&mut self) -> Result<(), Self::Error>;

    fn classify(&self, error: &Self::Error) -> ErrorClass;
}
