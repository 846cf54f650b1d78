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

use crate::frontier::{Batch, BatchId, ErrorClass, FrontierRecord, FrontierService};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// The number of items the fake puts into one batch.
pub const FAKE_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Error)]
pub enum FakeError {
    #[error("The operation timed out.")]
    Timeout,
    #[error("Connection refused.")]
    ConnectionRefused,
    #[error("The response was garbage.")]
    Broken,
}

type SlotKey = (String, String);

#[derive(Debug, Default)]
struct FakeState {
    pending: IndexMap<SlotKey, Vec<FrontierRecord>>,
    flushed: IndexMap<SlotKey, Vec<FrontierRecord>>,
    batches: IndexMap<SlotKey, VecDeque<Batch>>,
    add_failures: VecDeque<FakeError>,
    flush_failures: VecDeque<FakeError>,
    read_failures: VecDeque<FakeError>,
    delete_failures: VecDeque<FakeError>,
    add_calls: usize,
    read_calls: usize,
    read_mincounts: Vec<Option<usize>>,
    delete_calls: usize,
    deleted_ids: Vec<BatchId>,
    flush_calls: usize,
    flush_slot_calls: Vec<String>,
    next_batch_id: usize,
    closed: bool,
}

impl FakeState {
    fn publish(&mut self, key: &SlotKey) {
        let Some(records) = self.pending.shift_remove(key) else {
            return;
        };
        for chunk in records.chunks(FAKE_BATCH_SIZE) {
            self.next_batch_id += 1;
            let batch = Batch::new(
                format!("{}-{}", key.1, self.next_batch_id),
                chunk
                    .iter()
                    .map(|record| (record.fp.clone(), record.qdata.clone()))
                    .collect(),
            );
            self.batches.entry(key.clone()).or_default().push_back(batch);
        }
        self.flushed.entry(key.clone()).or_default().extend(records);
    }
}

/// An in memory frontier. Clones share the same state.
///
/// Batches stay readable until they are deleted, like in the real thing.
#[derive(Debug, Clone, Default)]
pub struct FakeFrontier {
    state: Arc<Mutex<FakeState>>,
}

fn key(frontier: &str, slot: &str) -> SlotKey {
    (frontier.to_string(), slot.to_string())
}

impl FakeFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, frontier: &str, slot: &str, batch: Batch) {
        self.state
            .lock()
            .unwrap()
            .batches
            .entry(key(frontier, slot))
            .or_default()
            .push_back(batch)
    }

    /// The next `times` adds fail with `error` and keep nothing.
    pub fn fail_adds(&self, error: FakeError, times: usize) {
        let mut state = self.state.lock().unwrap();
        state
            .add_failures
            .extend(std::iter::repeat(error).take(times));
    }

    /// The next `times` calls to flush or flush_slot fail with `error` and publish nothing.
    pub fn fail_flushes(&self, error: FakeError, times: usize) {
        let mut state = self.state.lock().unwrap();
        state
            .flush_failures
            .extend(std::iter::repeat(error).take(times));
    }

    pub fn fail_reads(&self, error: FakeError, times: usize) {
        let mut state = self.state.lock().unwrap();
        state
            .read_failures
            .extend(std::iter::repeat(error).take(times));
    }

    pub fn fail_deletes(&self, error: FakeError, times: usize) {
        let mut state = self.state.lock().unwrap();
        state
            .delete_failures
            .extend(std::iter::repeat(error).take(times));
    }

    pub fn batches(&self, frontier: &str, slot: &str) -> Vec<Batch> {
        self.state
            .lock()
            .unwrap()
            .batches
            .get(&key(frontier, slot))
            .map(|value| value.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pending(&self, frontier: &str, slot: &str) -> Vec<FrontierRecord> {
        self.state
            .lock()
            .unwrap()
            .pending
            .get(&key(frontier, slot))
            .cloned()
            .unwrap_or_default()
    }

    pub fn flushed(&self, frontier: &str, slot: &str) -> Vec<FrontierRecord> {
        self.state
            .lock()
            .unwrap()
            .flushed
            .get(&key(frontier, slot))
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().add_calls
    }

    pub fn read_calls(&self) -> usize {
        self.state.lock().unwrap().read_calls
    }

    pub fn read_mincounts(&self) -> Vec<Option<usize>> {
        self.state.lock().unwrap().read_mincounts.clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub fn deleted_ids(&self) -> Vec<BatchId> {
        self.state.lock().unwrap().deleted_ids.clone()
    }

    pub fn flush_calls(&self) -> usize {
        self.state.lock().unwrap().flush_calls
    }

    pub fn flush_slot_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().flush_slot_calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl FrontierService for FakeFrontier {
    type Error = FakeError;

    async fn add(&mut self, frontier: &str, slot: &str, records: &[FrontierRecord]) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.add_calls += 1;
        if let Some(error) = state.add_failures.pop_front() {
            return Err(error);
        }
        state
            .pending
            .entry(key(frontier, slot))
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.flush_calls += 1;
        if let Some(error) = state.flush_failures.pop_front() {
            return Err(error);
        }
        let keys: Vec<_> = state.pending.keys().cloned().collect();
        for key in keys {
            state.publish(&key);
        }
        Ok(())
    }

    async fn flush_slot(&mut self, frontier: &str, slot: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.flush_slot_calls.push(slot.to_string());
        if let Some(error) = state.flush_failures.pop_front() {
            return Err(error);
        }
        state.publish(&key(frontier, slot));
        Ok(())
    }

    async fn read(&mut self, frontier: &str, slot: &str, mincount: Option<usize>) -> Result<Vec<Batch>, Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.read_calls += 1;
        state.read_mincounts.push(mincount);
        if let Some(error) = state.read_failures.pop_front() {
            return Err(error);
        }
        let Some(batches) = state.batches.get(&key(frontier, slot)) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        let mut items = 0;
        for batch in batches {
            if let Some(mincount) = mincount {
                if !found.is_empty() && items >= mincount {
                    break;
                }
            }
            items += batch.requests.len();
            found.push(batch.clone());
        }
        Ok(found)
    }

    async fn delete(&mut self, frontier: &str, slot: &str, ids: &[BatchId]) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        if let Some(error) = state.delete_failures.pop_front() {
            return Err(error);
        }
        if let Some(batches) = state.batches.get_mut(&key(frontier, slot)) {
            batches.retain(|batch| !ids.contains(&batch.id));
        }
        state.deleted_ids.extend(ids.iter().cloned());
        Ok(())
    }

    async fn delete_slot(&mut self, frontier: &str, slot: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        let key = key(frontier, slot);
        state.batches.shift_remove(&key);
        state.pending.shift_remove(&key);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }

    fn classify(&self, error: &Self::Error) -> ErrorClass {
        match error {
            FakeError::Timeout | FakeError::ConnectionRefused => ErrorClass::Transient,
            FakeError::Broken => ErrorClass::Permanent,
        }
    }
}
