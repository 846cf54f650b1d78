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

mod args;
mod constants;
mod logging;

pub use args::{Command, HcfArgs};
pub use constants::create_example_config;
pub use logging::configure_logging;

use crate::backend::HcfBackend;
use crate::config::HcfConfig;
use crate::frontier::{FrontierService, HubstorageFrontier};
use crate::queue::{DiskQueue, FileDiskQueue};
use crate::request::Request;
use crate::runtime::Shutdown;
use crate::stats::MemoryStats;
use anyhow::{bail, Context};
use camino::Utf8Path;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

pub type HubstorageBackend = HcfBackend<HubstorageFrontier, FileDiskQueue>;

pub fn exec_args(args: HcfArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(folder) => HcfConfig::load_from(folder)?,
        None => HcfConfig::discover_or_default()?,
    };
    if let Some(level) = args.override_log_level {
        config.system.log_level = level;
    }

    if let Command::ExampleConfig { output } = &args.command {
        return write_example_config(output);
    }

    configure_logging(&config.system)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let shutdown = Shutdown::new();
    let result = runtime.block_on(async {
        let signal_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down.");
                signal_shutdown.shutdown();
            }
        });
        execute(args.command, config, shutdown).await
    });
    log::info!("Exit application.");
    result
}

fn write_example_config(output: &Utf8Path) -> anyhow::Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(output)
        .with_context(|| format!("Failed to create the example file {output}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &create_example_config())?;
    Ok(())
}

/// Builds a backend with the roles and the disk queue of `config`.
pub fn build_backend(config: &HcfConfig, shutdown: Shutdown) -> anyhow::Result<HubstorageBackend> {
    let mut backend = HubstorageBackend::new(config, shutdown);
    if let Some(producer) = config.producer_role() {
        let service = HubstorageFrontier::connect(&config.hubstorage)?;
        backend = backend
            .with_project(service.project())
            .with_producer(service, producer.clone());
    }
    if let Some(consumer) = config.consumer_role() {
        let service = HubstorageFrontier::connect(&config.hubstorage)?;
        backend = backend
            .with_project(service.project())
            .with_consumer(service, consumer.clone());
    }
    if let Some(disk) = &config.disk_queue {
        let queue = match &disk.path {
            Some(path) => FileDiskQueue::open(path, disk.max_element_size)?,
            None => FileDiskQueue::temporary(disk.max_element_size)?,
        };
        log::debug!("Disk queue at {}", queue.path());
        backend = backend.with_disk_queue(queue);
    }
    Ok(backend)
}

async fn execute(command: Command, mut config: HcfConfig, shutdown: Shutdown) -> anyhow::Result<()> {
    if let Command::DeleteSlot { slot } = &command {
        let consumer = config
            .consumer
            .as_mut()
            .filter(|consumer| !consumer.frontier.is_empty())
            .context("Deleting a slot needs a consumer frontier.")?;
        consumer.slot = slot.clone();
    }

    let stats = Arc::new(MemoryStats::new());
    let mut backend = build_backend(&config, shutdown)?.with_stats(stats.clone());
    backend.start();

    let result = match command {
        Command::ExampleConfig { .. } => Ok(()),
        Command::Push { urls } => push(&mut backend, &urls).await,
        Command::Pull { n } => pull(&mut backend, n.unwrap_or(config.max_next_requests)).await,
        Command::DeleteSlot { .. } => backend.delete_consumer_slot().await.map_err(Into::into),
    };
    backend.stop().await?;

    for (key, value) in stats.snapshot() {
        log::info!("{key}: {value}");
    }
    result
}

async fn push(backend: &mut HubstorageBackend, urls: &Utf8Path) -> anyhow::Result<()> {
    if !backend.is_producer() {
        bail!("Pushing links needs a producer frontier.");
    }
    let content = tokio::fs::read_to_string(urls)
        .await
        .with_context(|| format!("Failed to read {urls}"))?;
    let links = read_links(&content);
    let crawled = backend.page_crawled(links).await?;
    log::info!(
        "{} link(s) to the frontier, {} to memory, {} to disk.",
        crawled.frontier,
        crawled.memory,
        crawled.disk
    );
    Ok(())
}

async fn pull(backend: &mut HubstorageBackend, n: usize) -> anyhow::Result<()> {
    if !backend.is_consumer() {
        bail!("Pulling requests needs a consumer frontier.");
    }
    for request in pull_requests(backend, n).await {
        println!("{}", serde_json::to_string(&request)?);
    }
    Ok(())
}

/// The next `n` requests followed by the rest of the batches read for them.
async fn pull_requests<S, D>(backend: &mut HcfBackend<S, D>, n: usize) -> Vec<Request>
where
    S: FrontierService,
    D: DiskQueue,
{
    let mut requests = backend.get_next_requests(n).await;
    let parked = backend.take_parked();
    if !parked.is_empty() {
        log::info!("Printing {} more request(s) from the last read batch(es).", parked.len());
        requests.extend(parked);
    }
    requests
}

/// One url per line. Empty lines and lines starting with `#` are ignored.
fn read_links(content: &str) -> Vec<Request> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Request::new(line).with_url_fingerprint())
        .collect()
}
