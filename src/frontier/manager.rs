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

use crate::frontier::errors::FrontierError;
use crate::frontier::record::{Batch, BatchId, FrontierRecord};
use crate::frontier::retry::RetryPolicy;
use crate::frontier::service::{ErrorClass, FrontierService};
use crate::runtime::{Shutdown, ShutdownReceiverWithWait};
use indexmap::IndexMap;

/// The result of an add.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The link is buffered. Holds the number of links flushed along with it.
    Added(u64),
    /// Every attempt failed, the link was not added.
    Exhausted,
    /// The shutdown interrupted the backoff, the link was not added.
    Cancelled,
}

/// The result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The frontier answered. Empty if there was nothing to read.
    Batches(Vec<Batch>),
    /// Every attempt failed with a transient error.
    Exhausted,
    /// The shutdown interrupted the backoff.
    Cancelled,
}

impl ReadOutcome {
    /// The batches, empty for [ReadOutcome::Exhausted] and [ReadOutcome::Cancelled].
    pub fn into_batches(self) -> Vec<Batch> {
        match self {
            ReadOutcome::Batches(batches) => batches,
            ReadOutcome::Exhausted | ReadOutcome::Cancelled => Vec::new(),
        }
    }
}

/// The result of a delete.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Every attempt failed, the batches will be delivered again.
    Exhausted,
    /// The shutdown interrupted the backoff.
    Cancelled,
}

/// A resilient client for a single frontier.
///
/// Counts the links added per slot and flushes a slot as soon as `batch_size` links are
/// waiting. Every call to the service is retried with a linear backoff on transient errors.
#[derive(Debug)]
pub struct FrontierManager<S> {
    service: S,
    frontier: String,
    batch_size: u64,
    links_count: IndexMap<String, u64>,
    links_to_flush_count: IndexMap<String, u64>,
    retry: RetryPolicy,
    shutdown: Shutdown,
}

impl<S> FrontierManager<S>
where
    S: FrontierService,
{
    /// Creates a manager for `frontier`. A `batch_size` of 0 disables the auto flush.
    pub fn new(service: S, frontier: impl Into<String>, batch_size: u64) -> Self {
        Self {
            service,
            frontier: frontier.into(),
            batch_size,
            links_count: IndexMap::new(),
            links_to_flush_count: IndexMap::new(),
            retry: RetryPolicy::default(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Adds `record` to `slot`.
    ///
    /// Only counted links are buffered by the service. A failing auto flush is logged, the
    /// links stay buffered and the flush is tried again with the next add.
    pub async fn add_request(&mut self, slot: &str, record: FrontierRecord) -> Result<AddOutcome, FrontierError> {
        let records = [record];
        let max_attempts = self.retry.max_attempts;
        let mut added = false;
        for attempt in 1..=max_attempts {
            match self.service.add(&self.frontier, slot, &records).await {
                Ok(()) => {
                    added = true;
                    break;
                }
                Err(err) => self.check_transient(err, "add to", self.location(slot), attempt)?,
            }
            if !self.backoff(attempt).await {
                log::warn!("Stopped adding to {} due to shutdown.", self.location(slot));
                return Ok(AddOutcome::Cancelled);
            }
        }
        if !added {
            return Ok(AddOutcome::Exhausted);
        }

        *self.links_count.entry(slot.to_string()).or_default() += 1;
        let to_flush = self.links_to_flush_count.entry(slot.to_string()).or_default();
        *to_flush += 1;
        if self.batch_size != 0 && *to_flush >= self.batch_size {
            return match self.flush(Some(slot)).await {
                Ok(n_flushed_links) => Ok(AddOutcome::Added(n_flushed_links)),
                Err(err) => {
                    log::error!("{err}");
                    Ok(AddOutcome::Added(0))
                }
            };
        }
        Ok(AddOutcome::Added(0))
    }

    /// Flushes `slot` or all slots. Returns the number of links that were waiting.
    ///
    /// The counters are only reset if the service accepted the flush.
    pub async fn flush(&mut self, slot: Option<&str>) -> Result<u64, FrontierError> {
        let n_links_to_flush = self.number_of_links_to_flush(slot);
        if n_links_to_flush == 0 {
            return Ok(0);
        }
        let location = match slot {
            None => self.frontier.clone(),
            Some(slot) => self.location(slot),
        };
        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            let result = match slot {
                None => self.service.flush().await,
                Some(slot) => self.service.flush_slot(&self.frontier, slot).await,
            };
            match result {
                Ok(()) => {
                    match slot {
                        None => self
                            .links_to_flush_count
                            .values_mut()
                            .for_each(|value| *value = 0),
                        Some(slot) => {
                            if let Some(value) = self.links_to_flush_count.get_mut(slot) {
                                *value = 0;
                            }
                        }
                    }
                    return Ok(n_links_to_flush);
                }
                Err(err) => self.check_transient(err, "flush", location.clone(), attempt)?,
            }
            if !self.backoff(attempt).await {
                return Err(FrontierError::Cancelled {
                    action: "flush",
                    location,
                });
            }
        }
        Err(FrontierError::Exhausted {
            action: "flush",
            location,
            attempts: max_attempts,
        })
    }

    /// Reads batches from `slot`.
    ///
    /// Transient errors are retried, permanent ones returned. If all attempts fail the
    /// result is [ReadOutcome::Exhausted].
    pub async fn read(&mut self, slot: &str, mincount: Option<usize>) -> Result<ReadOutcome, FrontierError> {
        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            match self.service.read(&self.frontier, slot, mincount).await {
                Ok(batches) => return Ok(ReadOutcome::Batches(batches)),
                Err(err) => self.check_transient(err, "read from", self.location(slot), attempt)?,
            }
            if !self.backoff(attempt).await {
                log::warn!("Stopped reading from {} due to shutdown.", self.location(slot));
                return Ok(ReadOutcome::Cancelled);
            }
        }
        Ok(ReadOutcome::Exhausted)
    }

    /// Deletes the consumed batches `ids` from `slot`.
    ///
    /// Exhausting the retries is not an error, the batches are simply delivered again later.
    pub async fn delete(&mut self, slot: &str, ids: &[BatchId]) -> Result<DeleteOutcome, FrontierError> {
        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            match self.service.delete(&self.frontier, slot, ids).await {
                Ok(()) => return Ok(DeleteOutcome::Deleted),
                Err(err) => self.check_transient(err, "delete ids from", self.location(slot), attempt)?,
            }
            if !self.backoff(attempt).await {
                log::warn!("Stopped deleting from {} due to shutdown.", self.location(slot));
                return Ok(DeleteOutcome::Cancelled);
            }
        }
        log::error!(
            "Gave up deleting {} batch(es) from {}.",
            ids.len(),
            self.location(slot)
        );
        Ok(DeleteOutcome::Exhausted)
    }

    /// Deletes the whole `slot` from the frontier.
    pub async fn delete_slot(&mut self, slot: &str) -> Result<(), FrontierError> {
        self.service
            .delete_slot(&self.frontier, slot)
            .await
            .map_err(|err| FrontierError::service("delete", self.location(slot), err))
    }

    /// Releases the service.
    pub async fn close(&mut self) -> Result<(), FrontierError> {
        self.service
            .close()
            .await
            .map_err(|err| FrontierError::service("close", self.frontier.clone(), err))
    }

    /// The links ever added to `slot` or to all slots.
    pub fn number_of_links(&self, slot: Option<&str>) -> u64 {
        Self::count(&self.links_count, slot)
    }

    /// The links added to `slot` or to all slots since the last flush.
    pub fn number_of_links_to_flush(&self, slot: Option<&str>) -> u64 {
        Self::count(&self.links_to_flush_count, slot)
    }

    fn count(counter: &IndexMap<String, u64>, slot: Option<&str>) -> u64 {
        match slot {
            None => counter.values().sum(),
            Some(slot) => counter.get(slot).copied().unwrap_or(0),
        }
    }

    /// Logs the failed `attempt` if `err` is transient, permanent errors are returned.
    fn check_transient(
        &self,
        err: S::Error,
        action: &'static str,
        location: String,
        attempt: u32,
    ) -> Result<(), FrontierError> {
        match self.service.classify(&err) {
            ErrorClass::Permanent => Err(FrontierError::service(action, location, err)),
            ErrorClass::Transient => {
                log::error!(
                    "Could not {action} {location} try {attempt}/{}: {err}",
                    self.retry.max_attempts
                );
                Ok(())
            }
        }
    }

    fn location(&self, slot: &str) -> String {
        format!("{}/{}", self.frontier, slot)
    }

    /// Waits after the failed `attempt`. Returns false on shutdown.
    async fn backoff(&self, attempt: u32) -> bool {
        self.shutdown.sleep(self.retry.delay_after(attempt)).await
    }
}
