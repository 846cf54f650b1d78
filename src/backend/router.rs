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

use crate::backend::{BackendError, PollThrottle};
use crate::config::{ConsumerConfig, HcfConfig, ProducerConfig};
use crate::frontier::{
    AddOutcome, Batch, FrontierManager, FrontierRecord, FrontierService, ReadOutcome, RetryPolicy,
};
use crate::queue::{DiskQueue, FileDiskQueue, MemoryQueue};
use crate::request::{meta_keys, Meta, Request};
use crate::runtime::Shutdown;
use crate::slots::{HashSlotAssigner, SlotAssigner};
use crate::stats::{MemoryStats, StatKeys, StatsCollector};
use crate::strategies::{QdataRequestBuilder, RequestBuilder, StorePredicate, StoreWhenProducing};
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;

struct ProducerRole<S> {
    manager: FrontierManager<S>,
    config: ProducerConfig,
    slots: HashSlotAssigner,
}

struct ConsumerRole<S> {
    manager: FrontierManager<S>,
    config: ConsumerConfig,
    n_consumed_batches: u64,
    n_consumed_requests: u64,
}

impl<S> ConsumerRole<S> {
    fn max_batches_reached(&self) -> bool {
        self.config.max_batches != 0 && self.n_consumed_batches >= self.config.max_batches
    }

    fn max_requests_reached(&self) -> bool {
        self.config.max_requests != 0 && self.n_consumed_requests >= self.config.max_requests
    }

    fn quota_reached(&self) -> bool {
        self.max_batches_reached() || self.max_requests_reached()
    }

    /// The requests left until the request quota is reached, `None` without quota.
    fn remaining_requests(&self) -> Option<u64> {
        (self.config.max_requests != 0)
            .then(|| self.config.max_requests.saturating_sub(self.n_consumed_requests))
    }
}

/// Where the links of a crawled page ended up.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PageCrawled {
    pub frontier: usize,
    pub memory: usize,
    pub disk: usize,
}

/// The frontier backend of a crawl process.
///
/// Depending on the configured roles the backend writes crawled links to a frontier
/// (producer) and reads work from a frontier slot (consumer). Everything else is kept
/// in a memory queue that overflows into an optional disk queue.
///
/// The frontier is read in whole batches. Requests read beyond the asked number are
/// parked and handed out first by the next calls, regardless of the consumer quota.
pub struct HcfBackend<S, D = FileDiskQueue> {
    project: Option<String>,
    producer: Option<ProducerRole<S>>,
    consumer: Option<ConsumerRole<S>>,
    parked: MemoryQueue,
    memory: MemoryQueue,
    memory_queue_size: usize,
    disk: Option<D>,
    slot_assigner: Option<Box<dyn SlotAssigner + Send + Sync>>,
    store: Box<dyn StorePredicate + Send + Sync>,
    builder: Box<dyn RequestBuilder + Send + Sync>,
    stats: Arc<dyn StatsCollector + Send + Sync>,
    throttle: PollThrottle,
    retry: RetryPolicy,
    shutdown: Shutdown,
}

impl<S, D> HcfBackend<S, D>
where
    S: FrontierService,
    D: DiskQueue,
{
    /// A backend without roles. The retry settings apply to the roles added afterwards.
    pub fn new(config: &HcfConfig, shutdown: Shutdown) -> Self {
        Self {
            project: config.hubstorage.project_id.clone(),
            producer: None,
            consumer: None,
            parked: MemoryQueue::new(),
            memory: MemoryQueue::new(),
            memory_queue_size: config.memory_queue_size,
            disk: None,
            slot_assigner: None,
            store: Box::new(StoreWhenProducing),
            builder: Box::new(QdataRequestBuilder),
            stats: Arc::new(MemoryStats::new()),
            throttle: PollThrottle::default(),
            retry: config.retry.into(),
            shutdown,
        }
    }

    pub fn with_producer(mut self, service: S, config: ProducerConfig) -> Self {
        let manager = FrontierManager::new(service, config.frontier.clone(), config.batch_size)
            .with_retry_policy(self.retry)
            .with_shutdown(self.shutdown.clone());
        let slots = HashSlotAssigner::new(config.slot_prefix.clone(), config.number_of_slots);
        self.producer = Some(ProducerRole {
            manager,
            config,
            slots,
        });
        self
    }

    pub fn with_consumer(mut self, service: S, config: ConsumerConfig) -> Self {
        let manager = FrontierManager::new(service, config.frontier.clone(), 0)
            .with_retry_policy(self.retry)
            .with_shutdown(self.shutdown.clone());
        self.consumer = Some(ConsumerRole {
            manager,
            config,
            n_consumed_batches: 0,
            n_consumed_requests: 0,
        });
        self
    }

    pub fn with_disk_queue(mut self, disk: D) -> Self {
        self.disk = Some(disk);
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Replaces the fingerprint based slot assignment of the producer.
    pub fn with_slot_assigner<A>(mut self, assigner: A) -> Self
    where
        A: SlotAssigner + Send + Sync + 'static,
    {
        self.slot_assigner = Some(Box::new(assigner));
        self
    }

    pub fn with_store_predicate<P>(mut self, predicate: P) -> Self
    where
        P: StorePredicate + Send + Sync + 'static,
    {
        self.store = Box::new(predicate);
        self
    }

    pub fn with_request_builder<B>(mut self, builder: B) -> Self
    where
        B: RequestBuilder + Send + Sync + 'static,
    {
        self.builder = Box::new(builder);
        self
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsCollector + Send + Sync>) -> Self {
        self.stats = stats;
        self
    }

    pub fn is_producer(&self) -> bool {
        self.producer.is_some()
    }

    pub fn is_consumer(&self) -> bool {
        self.consumer.is_some()
    }

    /// Requests read from the frontier that were not handed out yet.
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Removes and returns the parked requests.
    pub fn take_parked(&mut self) -> Vec<Request> {
        std::iter::from_fn(|| self.parked.pop()).collect()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn disk_len(&self) -> usize {
        self.disk.as_ref().map_or(0, |disk| disk.len())
    }

    pub fn n_consumed_batches(&self) -> u64 {
        self.consumer.as_ref().map_or(0, |consumer| consumer.n_consumed_batches)
    }

    pub fn n_consumed_requests(&self) -> u64 {
        self.consumer
            .as_ref()
            .map_or(0, |consumer| consumer.n_consumed_requests)
    }

    /// The links written to the frontier, `None` if not producing.
    pub fn n_produced_links(&self) -> Option<u64> {
        self.producer
            .as_ref()
            .map(|producer| producer.manager.number_of_links(None))
    }

    /// Initializes the stats of the roles and logs the setup.
    pub fn start(&mut self) {
        if let Some(producer) = &self.producer {
            self.stats
                .set_value(&StatKeys::producer(&producer.config.frontier), 0);
        }
        if let Some(consumer) = &self.consumer {
            self.stats.set_value(
                &StatKeys::consumer(&consumer.config.frontier, &consumer.config.slot),
                0,
            );
        }

        let producer = match &self.producer {
            Some(producer) => format!(
                "{}/{}",
                producer.config.frontier,
                producer.config.slots_description()
            ),
            None => "NO".to_string(),
        };
        let consumer = match &self.consumer {
            Some(consumer) => format!("{}/{}", consumer.config.frontier, consumer.config.slot),
            None => "NO".to_string(),
        };
        log::info!("HCF project: {}", self.project.as_deref().unwrap_or("-"));
        log::info!("HCF producer: {producer}");
        log::info!("HCF consumer: {consumer}");
    }

    /// Closes the disk queue, flushes the producer and releases both frontier connections.
    ///
    /// Every step is attempted, the first error is returned.
    pub async fn stop(&mut self) -> Result<(), BackendError> {
        let mut results: Vec<Result<(), BackendError>> = Vec::new();
        if let Some(disk) = self.disk.as_mut() {
            results.push(disk.close().map_err(Into::into));
        }
        if !self.parked.is_empty() {
            log::warn!(
                "{} request(s) read from the frontier were never handed out.",
                self.parked.len()
            );
        }
        if !self.memory.is_empty() {
            log::info!(
                "Dropping {} request(s) left in the memory queue.",
                self.memory.len()
            );
        }
        if let Some(n_produced_links) = self.n_produced_links() {
            log::info!("Wrote {n_produced_links} link(s) to the frontier.");
        }
        if let Some(producer) = self.producer.as_mut() {
            match producer.manager.flush(None).await {
                Ok(0) => {}
                Ok(n_flushed_links) => log::info!("Flushing {n_flushed_links} link(s) to all slots"),
                Err(err) => results.push(Err(err.into())),
            }
            results.push(producer.manager.close().await.map_err(Into::into));
        }
        if let Some(consumer) = self.consumer.as_mut() {
            results.push(consumer.manager.close().await.map_err(Into::into));
        }

        let mut errors = results.into_iter().filter_map(Result::err);
        let first = errors.next();
        for err in errors {
            log::error!("Stopping the backend: {err}");
        }
        first.map_or(Ok(()), Err)
    }

    /// Seeds bypass the frontier and go straight to the memory queue.
    pub fn add_seeds(&mut self, seeds: impl IntoIterator<Item = Request>) {
        self.memory.extend(seeds)
    }

    /// Writes the frontier bound links to their slots and returns the others.
    ///
    /// Links the frontier does not take are returned with the others.
    pub async fn partition_links(&mut self, links: Vec<Request>) -> Result<Vec<Request>, BackendError> {
        let producing = self.producer.is_some();
        let mut local = Vec::new();
        for link in links {
            if !self.store.is_frontier_bound(&link, producing) {
                local.push(link);
                continue;
            }
            let Some(producer) = self.producer.as_mut() else {
                return Err(BackendError::ProducerNotConfigured(link.url));
            };
            let slot = match self.slot_assigner.as_deref() {
                Some(assigner) => assigner.slot_for(&link)?,
                None => producer.slots.slot_for(&link)?,
            };
            let record = FrontierRecord::from_request(link.clone());
            let n_flushed_links = match producer.manager.add_request(&slot, record).await {
                Ok(AddOutcome::Added(n_flushed_links)) => n_flushed_links,
                Ok(AddOutcome::Exhausted | AddOutcome::Cancelled) => {
                    log::error!("Could not add {link} to slot {slot}, keeping it local.");
                    local.push(link);
                    continue;
                }
                Err(err) => {
                    log::error!("{err}. Keeping {link} local.");
                    local.push(link);
                    continue;
                }
            };
            if n_flushed_links > 0 {
                log::info!("Flushing {n_flushed_links} link(s) to slot {slot}");
            }
            self.stats
                .inc_value(&StatKeys::producer_slot(&producer.config.frontier, &slot), 1);
            self.stats
                .inc_value(&StatKeys::producer(&producer.config.frontier), 1);
        }
        Ok(local)
    }

    /// Handles the links found on a crawled page.
    ///
    /// Frontier bound links are written to the frontier. The others fill the memory queue up
    /// to its size and overflow into the disk queue. Without disk queue the memory queue is
    /// unbounded. Requests the disk queue rejects end up in the memory queue.
    pub async fn page_crawled(&mut self, links: Vec<Request>) -> Result<PageCrawled, BackendError> {
        let n_links = links.len();
        let local = self.partition_links(links).await?;
        let mut summary = PageCrawled {
            frontier: n_links - local.len(),
            ..PageCrawled::default()
        };

        let to_memory = if self.disk.is_some() {
            self.memory_queue_size.saturating_sub(self.memory.len())
        } else {
            local.len()
        };
        let mut local = local.into_iter();
        for mut request in local.by_ref().take(to_memory) {
            request.increment_depth();
            self.memory.push(request);
            summary.memory += 1;
        }
        for request in local {
            let Some(disk) = self.disk.as_mut() else {
                self.memory.push(request);
                summary.memory += 1;
                continue;
            };
            match disk.push(request) {
                Ok(()) => summary.disk += 1,
                Err(rejected) => {
                    if rejected.is_serialization() {
                        log::warn!(
                            "Request {} not serializable, added to the memory queue: {}",
                            rejected.request,
                            rejected.cause
                        );
                    } else {
                        log::error!("{rejected}. Added to the memory queue.");
                    }
                    self.memory.push(rejected.into_request());
                    summary.memory += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Returns up to `max_next_requests` requests from the parked requests, memory, disk and
    /// the frontier, in this order.
    ///
    /// Parked requests were already consumed and only count against `max_next_requests`.
    /// The frontier is only asked if the local queues are empty or the poll throttle elapsed.
    /// Frontier requests beyond the limit are parked.
    pub async fn get_next_requests(&mut self, max_next_requests: usize) -> Vec<Request> {
        let mut requests = Vec::new();
        while requests.len() < max_next_requests {
            match self.parked.pop() {
                Some(request) => requests.push(request),
                None => break,
            }
        }

        let mut limit = max_next_requests;
        if let Some(remaining) = self
            .consumer
            .as_ref()
            .and_then(ConsumerRole::remaining_requests)
        {
            let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
            limit = limit.min(requests.len().saturating_add(remaining));
        }

        while requests.len() < limit {
            match self.memory.pop() {
                Some(request) => requests.push(request),
                None => break,
            }
        }
        if let Some(disk) = self.disk.as_mut() {
            while requests.len() < limit && !disk.is_empty() {
                match disk.pop() {
                    Ok(Some(request)) => requests.push(request),
                    Ok(None) => break,
                    Err(err) => {
                        log::error!("Failed to read from the disk queue: {err}");
                        break;
                    }
                }
            }
        }

        let may_poll = requests.len() < limit
            && self
                .consumer
                .as_ref()
                .is_some_and(|consumer| !consumer.quota_reached())
            && (requests.is_empty() || self.throttle.is_elapsed());
        if may_poll {
            let remaining = limit - requests.len();
            let mut from_frontier = self.pull_from_frontier(remaining).await;
            if from_frontier.len() > remaining {
                let parked = from_frontier.split_off(remaining);
                log::debug!("Parked {} request(s) read from the frontier.", parked.len());
                self.parked.extend(parked);
            }
            requests.extend(from_frontier);
            self.throttle.reset();
        }
        requests
    }

    /// Reads batches until `n_min_requests` requests are found, a quota is reached
    /// or the slot is empty. Every read batch is deleted afterwards.
    async fn pull_from_frontier(&mut self, n_min_requests: usize) -> Vec<Request> {
        let Some(consumer) = self.consumer.as_mut() else {
            return Vec::new();
        };
        let frontier = consumer.config.frontier.clone();
        let slot = consumer.config.slot.clone();
        let requests_key = StatKeys::consumer_requests(&frontier, &slot);
        let batches_key = StatKeys::consumer_batches(&frontier, &slot);

        let mut found = Vec::new();
        let mut data = true;
        while data && found.len() < n_min_requests && !consumer.quota_reached() {
            data = false;
            let remaining = n_min_requests - found.len();
            let batches = match consumer.manager.read(&slot, Some(remaining)).await {
                Ok(ReadOutcome::Batches(batches)) => batches,
                Ok(ReadOutcome::Exhausted) => {
                    log::error!("Giving up reading from {frontier}/{slot} for now.");
                    break;
                }
                Ok(ReadOutcome::Cancelled) => break,
                Err(err) => {
                    log::error!("{err}");
                    break;
                }
            };

            let mut consumed = Vec::with_capacity(batches.len());
            for Batch { id, requests } in batches {
                data = true;
                let n_items = requests.len();
                self.stats.inc_value(&requests_key, n_items as u64);
                for (fingerprint, qdata) in requests {
                    let Some(mut request) = self.builder.make_request(&fingerprint, &qdata) else {
                        log::trace!("Dropped {fingerprint} from batch {id}");
                        continue;
                    };
                    request.set_created_at(OffsetDateTime::now_utc());
                    request.set_depth(0);
                    request
                        .meta
                        .entry(meta_keys::SCRAPY_META)
                        .or_insert_with(|| Value::Object(Meta::new()));
                    found.push(request);
                    consumer.n_consumed_requests += 1;
                }
                self.stats.inc_value(&batches_key, 1);
                log::info!("Reading {n_items} request(s) from batch {id}");
                consumed.push(id);
            }

            if !consumed.is_empty() {
                if let Err(err) = consumer.manager.delete(&slot, &consumed).await {
                    log::error!("{err}");
                }
                consumer.n_consumed_batches += consumed.len() as u64;
            }
        }
        found
    }

    /// Called by the crawler for failed requests.
    pub fn request_error(&mut self, request: &Request, error: &str) {
        log::debug!("Request {request} failed: {error}");
    }

    /// Removes the consumer slot with all its batches from the frontier.
    pub async fn delete_consumer_slot(&mut self) -> Result<(), BackendError> {
        let consumer = self
            .consumer
            .as_mut()
            .ok_or(BackendError::ConsumerNotConfigured)?;
        consumer.manager.delete_slot(&consumer.config.slot).await?;
        log::info!(
            "Deleted slot {}/{}",
            consumer.config.frontier,
            consumer.config.slot
        );
        Ok(())
    }
}
