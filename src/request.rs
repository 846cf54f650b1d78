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

use data_encoding::HEXLOWER;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// The free form metadata of a request.
pub type Meta = Map<String, Value>;

/// Headers and cookies of a request.
pub type StringMap = IndexMap<String, String>;

/// The well known keys in [Request::meta].
pub mod meta_keys {
    /// The stable dedup key, a hex string.
    pub const FINGERPRINT: &str = "fingerprint";
    /// Incremented every time a request passes the local queues.
    pub const DEPTH: &str = "depth";
    /// Set when a request is rebuilt from the frontier.
    pub const CREATED_AT: &str = "created_at";
    /// Forces a specific producer slot.
    pub const PRODUCER_SLOT: &str = "hcf_producer_slot";
    /// Overrides the number of producer slots for a single request.
    pub const PRODUCER_NUMBER_OF_SLOTS: &str = "hcf_producer_number_of_slots";
    /// Internal marker, never sent to the frontier.
    pub const ORIGIN_IS_FRONTIER: &str = "origin_is_frontier";
    /// Metadata owned by the host crawler.
    pub const SCRAPY_META: &str = "scrapy_meta";
}

/// A hex xxh128 digest of `url`, usable as fingerprint.
pub fn url_fingerprint(url: &str) -> String {
    let digest = twox_hash::xxh3::hash128(url.as_bytes());
    HEXLOWER.encode(&digest.to_be_bytes())
}

const fn _default_method() -> &'static str {
    "GET"
}

fn default_method() -> String {
    _default_method().to_string()
}

/// A single crawlable unit as seen by the backend.
///
/// Host crawlers convert their own request type into this one. The request is owned
/// by exactly one queue tier at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: StringMap,
    #[serde(default)]
    pub cookies: StringMap,
    #[serde(default)]
    pub meta: Meta,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: StringMap::new(),
            cookies: StringMap::new(),
            meta: Meta::new(),
        }
    }

    pub fn with_fingerprint(self, fingerprint: impl Into<String>) -> Self {
        self.with_meta(meta_keys::FINGERPRINT, Value::String(fingerprint.into()))
    }

    /// Uses the digest of the url as fingerprint.
    pub fn with_url_fingerprint(self) -> Self {
        let fingerprint = url_fingerprint(&self.url);
        self.with_fingerprint(fingerprint)
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.meta.get(meta_keys::FINGERPRINT).and_then(Value::as_str)
    }

    /// The depth of the request, 0 if unset.
    pub fn depth(&self) -> u64 {
        self.meta
            .get(meta_keys::DEPTH)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn set_depth(&mut self, depth: u64) {
        self.meta.insert(meta_keys::DEPTH.to_string(), depth.into());
    }

    pub fn increment_depth(&mut self) {
        self.set_depth(self.depth().saturating_add(1))
    }

    pub fn created_at(&self) -> Option<OffsetDateTime> {
        let value = self.meta.get(meta_keys::CREATED_AT)?.as_str()?;
        OffsetDateTime::parse(value, &Rfc3339).ok()
    }

    pub fn set_created_at(&mut self, at: OffsetDateTime) {
        match at.format(&Rfc3339) {
            Ok(formatted) => {
                self.meta
                    .insert(meta_keys::CREATED_AT.to_string(), Value::String(formatted));
            }
            Err(err) => {
                log::warn!("Failed to format the creation time {at}: {err}");
            }
        }
    }

    /// The explicit slot override, if any.
    pub fn producer_slot(&self) -> Option<&str> {
        self.meta.get(meta_keys::PRODUCER_SLOT).and_then(Value::as_str)
    }

    /// The per-request number of slots, if any.
    pub fn producer_number_of_slots(&self) -> Option<u64> {
        self.meta
            .get(meta_keys::PRODUCER_NUMBER_OF_SLOTS)
            .and_then(Value::as_u64)
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} {}>", self.method, self.url)
    }
}

#[cfg(test)]
mod test {
    use crate::request::{meta_keys, url_fingerprint, Request};
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn depth_defaults_to_zero_and_increments() {
        let mut request = Request::new("https://www.example.com/");
        assert_eq!(0, request.depth());
        request.increment_depth();
        request.increment_depth();
        assert_eq!(2, request.depth());
        assert_eq!(Some(&json!(2)), request.meta.get(meta_keys::DEPTH));
    }

    #[test]
    fn created_at_is_stored_as_rfc3339() {
        let mut request = Request::new("https://www.example.com/");
        request.set_created_at(datetime!(2024-05-01 12:30:00 UTC));
        assert_eq!(
            Some(&json!("2024-05-01T12:30:00Z")),
            request.meta.get(meta_keys::CREATED_AT)
        );
        assert_eq!(Some(datetime!(2024-05-01 12:30:00 UTC)), request.created_at());
    }

    #[test]
    fn can_deserialize_a_sparse_request() {
        let request: Request =
            serde_json::from_value(json!({"url": "https://www.example.com/"})).unwrap();
        assert_eq!("GET", request.method);
        assert!(request.meta.is_empty());
        assert_eq!(None, request.fingerprint());
    }

    #[test]
    fn url_fingerprint_is_stable_hex() {
        let fingerprint = url_fingerprint("https://www.example.com/");
        assert_eq!(32, fingerprint.len());
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fingerprint, url_fingerprint("https://www.example.com/"));
        assert_ne!(fingerprint, url_fingerprint("https://www.example.com/a"));
        let request = Request::new("https://www.example.com/").with_url_fingerprint();
        assert_eq!(Some(fingerprint.as_str()), request.fingerprint());
    }
}
