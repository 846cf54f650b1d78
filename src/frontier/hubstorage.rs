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

use crate::config::HubstorageConfig;
use crate::frontier::errors::HubstorageError;
use crate::frontier::record::{Batch, BatchId, FrontierRecord};
use crate::frontier::service::{ErrorClass, FrontierService};
use indexmap::IndexMap;
use itertools::Itertools;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Env var holding the api key.
pub const ENV_API_KEY: &str = "SH_APIKEY";
/// Env var holding the job key `project/spider/job` of a running job.
pub const ENV_JOB_KEY: &str = "SHUB_JOBKEY";

/// The write buffer of a single slot.
#[derive(Debug, Default)]
struct SlotWriter {
    pending: Vec<FrontierRecord>,
}

/// A [FrontierService] talking to the hubstorage frontier api.
///
/// Links are buffered per slot and uploaded as json lines in chunks of
/// `upload_chunk_size`.
pub struct HubstorageFrontier {
    client: ClientWithMiddleware,
    endpoint: Url,
    auth: String,
    project: String,
    upload_chunk_size: usize,
    writers: IndexMap<(String, String), SlotWriter>,
}

impl HubstorageFrontier {
    /// Creates a client with the credentials from `config` or the environment.
    pub fn connect(config: &HubstorageConfig) -> Result<Self, HubstorageError> {
        Self::connect_with_env(config, |key| std::env::var(key).ok())
    }

    fn connect_with_env<F>(config: &HubstorageConfig, env: F) -> Result<Self, HubstorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if config.endpoint.cannot_be_a_base() {
            return Err(HubstorageError::InvalidEndpoint(config.endpoint.clone()));
        }
        let (auth, project) = resolve_credentials(config, env)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client: ClientBuilder::new(client).build(),
            endpoint: config.endpoint.clone(),
            auth,
            project,
            upload_chunk_size: config.upload_chunk_size.max(1),
            writers: IndexMap::new(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `{endpoint}/hcf/{project}/{frontier}/s/{slot}/{tail..}`
    fn slot_url(&self, frontier: &str, slot: &str, tail: &[&str]) -> Result<Url, HubstorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| HubstorageError::InvalidEndpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .extend(["hcf", self.project.as_str(), frontier, "s", slot])
            .extend(tail);
        Ok(url)
    }

    async fn upload(&self, frontier: &str, slot: &str, records: &[FrontierRecord]) -> Result<(), HubstorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let url = self.slot_url(frontier, slot, &[])?;
        let body = encode_lines(records).map_err(HubstorageError::Encode)?;
        log::trace!("Upload {} link(s) to {url}", records.len());
        self.client
            .post(url)
            .basic_auth(&self.auth, None::<&str>)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Uploads the complete chunks of `frontier/slot`, or everything if `all` is set.
    async fn upload_pending(&mut self, frontier: &str, slot: &str, all: bool) -> Result<(), HubstorageError> {
        let key = (frontier.to_string(), slot.to_string());
        let Some(writer) = self.writers.get_mut(&key) else {
            return Ok(());
        };
        let mut pending = std::mem::take(&mut writer.pending);
        let chunk_size = self.upload_chunk_size;
        let result = loop {
            if pending.is_empty() || (!all && pending.len() < chunk_size) {
                break Ok(());
            }
            let chunk_end = chunk_size.min(pending.len());
            if let Err(err) = self.upload(frontier, slot, &pending[..chunk_end]).await {
                break Err(err);
            }
            pending.drain(..chunk_end);
        };
        if let Some(writer) = self.writers.get_mut(&key) {
            pending.append(&mut writer.pending);
            writer.pending = pending;
        }
        result
    }
}

impl FrontierService for HubstorageFrontier {
    type Error = HubstorageError;

    /// Buffers `records` and uploads the complete chunks. A failed upload keeps the
    /// chunks buffered for the next add or flush, so adding never fails.
    async fn add(&mut self, frontier: &str, slot: &str, records: &[FrontierRecord]) -> Result<(), Self::Error> {
        self.writers
            .entry((frontier.to_string(), slot.to_string()))
            .or_default()
            .pending
            .extend_from_slice(records);
        if let Err(err) = self.upload_pending(frontier, slot, false).await {
            log::warn!("Upload to {frontier}/{slot} failed, the links stay buffered: {err}");
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        let keys = self.writers.keys().cloned().collect_vec();
        for (frontier, slot) in keys {
            self.upload_pending(&frontier, &slot, true).await?;
        }
        Ok(())
    }

    async fn flush_slot(&mut self, frontier: &str, slot: &str) -> Result<(), Self::Error> {
        self.upload_pending(frontier, slot, true).await
    }

    async fn read(&mut self, frontier: &str, slot: &str, mincount: Option<usize>) -> Result<Vec<Batch>, Self::Error> {
        let mut url = self.slot_url(frontier, slot, &["q"])?;
        if let Some(mincount) = mincount {
            url.query_pairs_mut()
                .append_pair("mincount", &mincount.to_string());
        }
        let body = self
            .client
            .get(url)
            .basic_auth(&self.auth, None::<&str>)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_batches(&body)
    }

    async fn delete(&mut self, frontier: &str, slot: &str, ids: &[BatchId]) -> Result<(), Self::Error> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.slot_url(frontier, slot, &["q", "deleted"])?;
        let body = encode_lines(ids).map_err(HubstorageError::Encode)?;
        self.client
            .post(url)
            .basic_auth(&self.auth, None::<&str>)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_slot(&mut self, frontier: &str, slot: &str) -> Result<(), Self::Error> {
        self.writers
            .shift_remove(&(frontier.to_string(), slot.to_string()));
        let url = self.slot_url(frontier, slot, &[])?;
        self.client
            .delete(url)
            .basic_auth(&self.auth, None::<&str>)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.flush().await?;
        self.writers.clear();
        Ok(())
    }

    fn classify(&self, error: &Self::Error) -> ErrorClass {
        match error {
            HubstorageError::Http(_) | HubstorageError::Middleware(_) => ErrorClass::Transient,
            HubstorageError::InvalidEndpoint(_)
            | HubstorageError::Decode { .. }
            | HubstorageError::Encode(_)
            | HubstorageError::MissingAuth
            | HubstorageError::MissingProject => ErrorClass::Permanent,
        }
    }
}

/// Finds the api key and project id. The config wins over the environment.
fn resolve_credentials<F>(config: &HubstorageConfig, env: F) -> Result<(String, String), HubstorageError>
where
    F: Fn(&str) -> Option<String>,
{
    let auth = config
        .auth
        .clone()
        .or_else(|| env(ENV_API_KEY))
        .filter(|value| !value.is_empty())
        .ok_or(HubstorageError::MissingAuth)?;
    let project = config
        .project_id
        .clone()
        .or_else(|| {
            env(ENV_JOB_KEY).and_then(|job| job.split('/').next().map(str::to_string))
        })
        .filter(|value| !value.is_empty())
        .ok_or(HubstorageError::MissingProject)?;
    Ok((auth, project))
}

fn encode_lines<T: Serialize>(items: &[T]) -> Result<String, serde_json::Error> {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        lines.push(serde_json::to_string(item)?);
    }
    Ok(lines.join("\n"))
}

fn parse_batches(body: &str) -> Result<Vec<Batch>, HubstorageError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| HubstorageError::Decode {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::{encode_lines, parse_batches, resolve_credentials, HubstorageFrontier};
    use crate::config::HubstorageConfig;
    use crate::frontier::{
        ErrorClass, FrontierManager, FrontierRecord, FrontierService, HubstorageError, ReadOutcome,
        RetryPolicy,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    fn config() -> HubstorageConfig {
        let mut config = HubstorageConfig::default();
        config.auth = Some("apikey".to_string());
        config.project_id = Some("123".to_string());
        config
    }

    /// Serves every request on a local port with an empty `status_line` response.
    async fn answer_with(status_line: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buffer = [0u8; 8192];
                    let _ = stream.read(&mut buffer).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{address}/").parse().unwrap()
    }

    #[test]
    fn builds_the_slot_urls() {
        let frontier = HubstorageFrontier::connect_with_env(&config(), |_| None).unwrap();
        assert_eq!(
            "https://storage.scrapinghub.com/hcf/123/links/s/s0",
            frontier.slot_url("links", "s0", &[]).unwrap().as_str()
        );
        assert_eq!(
            "https://storage.scrapinghub.com/hcf/123/links/s/7/q/deleted",
            frontier.slot_url("links", "7", &["q", "deleted"]).unwrap().as_str()
        );
    }

    #[test]
    fn credentials_fall_back_to_the_environment() {
        let env = |key: &str| match key {
            "SH_APIKEY" => Some("from-env".to_string()),
            "SHUB_JOBKEY" => Some("456/1/7".to_string()),
            _ => None,
        };
        let (auth, project) = resolve_credentials(&HubstorageConfig::default(), env).unwrap();
        assert_eq!("from-env", auth);
        assert_eq!("456", project);

        let (auth, project) = resolve_credentials(&config(), env).unwrap();
        assert_eq!("apikey", auth);
        assert_eq!("123", project);
    }

    #[test]
    fn missing_credentials_are_reported() {
        assert!(matches!(
            resolve_credentials(&HubstorageConfig::default(), |_| None),
            Err(HubstorageError::MissingAuth)
        ));
        let mut config = HubstorageConfig::default();
        config.auth = Some("apikey".to_string());
        assert!(matches!(
            resolve_credentials(&config, |_| None),
            Err(HubstorageError::MissingProject)
        ));
    }

    #[test]
    fn encodes_json_lines() {
        let records = vec![
            FrontierRecord::new("/a", json!({"x": 1})),
            FrontierRecord::new("/b", json!(null)),
        ];
        assert_eq!(
            "{\"fp\":\"/a\",\"qdata\":{\"x\":1}}\n{\"fp\":\"/b\",\"qdata\":null}",
            encode_lines(&records).unwrap()
        );
    }

    #[test]
    fn parses_the_read_response() {
        let body = "{\"id\": \"b1\", \"requests\": [[\"/a\", null]]}\n\n{\"id\": \"b2\", \"requests\": []}\n";
        let batches = parse_batches(body).unwrap();
        assert_eq!(2, batches.len());
        assert_eq!("b2", batches[1].id);
        assert!(parse_batches("").unwrap().is_empty());
        assert!(matches!(
            parse_batches("{\"id\": \"b1\"}\nnot json"),
            Err(HubstorageError::Decode { line: 2, .. })
        ));
    }

    #[tokio::test]
    async fn every_http_error_is_transient() {
        let frontier = HubstorageFrontier::connect_with_env(&config(), |_| None).unwrap();
        assert_eq!(ErrorClass::Permanent, frontier.classify(&HubstorageError::MissingAuth));
        let decode = parse_batches("nope").unwrap_err();
        assert_eq!(ErrorClass::Permanent, frontier.classify(&decode));
        let middleware = HubstorageError::Middleware(reqwest_middleware::Error::Middleware(
            anyhow::anyhow!("connection reset"),
        ));
        assert_eq!(ErrorClass::Transient, frontier.classify(&middleware));

        let mut config = config();
        config.endpoint = answer_with("404 Not Found").await;
        let mut frontier = HubstorageFrontier::connect_with_env(&config, |_| None).unwrap();
        let err = frontier.read("links", "0", None).await.unwrap_err();
        assert!(matches!(
            &err,
            HubstorageError::Http(inner) if inner.status() == Some(reqwest::StatusCode::NOT_FOUND)
        ));
        assert_eq!(ErrorClass::Transient, frontier.classify(&err));
    }

    #[tokio::test]
    async fn client_errors_use_up_the_retries() {
        let mut config = config();
        config.endpoint = answer_with("403 Forbidden").await;
        let frontier = HubstorageFrontier::connect_with_env(&config, |_| None).unwrap();
        let mut manager = FrontierManager::new(frontier, "links", 0)
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
        assert_eq!(ReadOutcome::Exhausted, manager.read("0", Some(10)).await.unwrap());
    }

    #[tokio::test]
    async fn failed_uploads_stay_buffered() {
        let mut config = config();
        config.endpoint = answer_with("503 Service Unavailable").await;
        config.upload_chunk_size = 1;
        let mut frontier = HubstorageFrontier::connect_with_env(&config, |_| None).unwrap();
        frontier
            .add("links", "0", &[FrontierRecord::new("/a", json!(null))])
            .await
            .unwrap();
        let key = ("links".to_string(), "0".to_string());
        assert_eq!(1, frontier.writers[&key].pending.len());
        assert!(frontier.flush_slot("links", "0").await.is_err());
        assert_eq!(1, frontier.writers[&key].pending.len());
    }

    #[tokio::test]
    async fn buffers_until_a_chunk_is_full() {
        let mut config = config();
        config.upload_chunk_size = 3;
        let mut frontier = HubstorageFrontier::connect_with_env(&config, |_| None).unwrap();
        frontier
            .add("links", "0", &[FrontierRecord::new("/a", json!(null))])
            .await
            .unwrap();
        frontier
            .add("links", "0", &[FrontierRecord::new("/b", json!(null))])
            .await
            .unwrap();
        let key = ("links".to_string(), "0".to_string());
        assert_eq!(2, frontier.writers[&key].pending.len());
    }
}
