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

use crate::request::{Meta, Request, StringMap};
use serde_json::Value;

/// Decides if a crawled link is written to the frontier or queued locally.
pub trait StorePredicate {
    /// `producing` is true if a producer role is configured.
    fn is_frontier_bound(&self, request: &Request, producing: bool) -> bool;
}

impl<F> StorePredicate for F
where
    F: Fn(&Request, bool) -> bool,
{
    #[inline]
    fn is_frontier_bound(&self, request: &Request, producing: bool) -> bool {
        self(request, producing)
    }
}

/// Every link goes to the frontier if this process produces, otherwise everything stays local.
#[derive(Debug, Copy, Clone, Default)]
pub struct StoreWhenProducing;

impl StorePredicate for StoreWhenProducing {
    #[inline]
    fn is_frontier_bound(&self, _: &Request, producing: bool) -> bool {
        producing
    }
}

/// Rebuilds a request from an item read from the frontier. `None` drops the item.
pub trait RequestBuilder {
    fn make_request(&self, fingerprint: &str, qdata: &Value) -> Option<Request>;
}

impl<F> RequestBuilder for F
where
    F: Fn(&str, &Value) -> Option<Request>,
{
    #[inline]
    fn make_request(&self, fingerprint: &str, qdata: &Value) -> Option<Request> {
        self(fingerprint, qdata)
    }
}

/// Reads the layout written by the producer: `{"request": {method, headers, cookies, meta}}`.
///
/// The url is taken from `qdata.url` and falls back to the fingerprint.
#[derive(Debug, Copy, Clone, Default)]
pub struct QdataRequestBuilder;

impl RequestBuilder for QdataRequestBuilder {
    fn make_request(&self, fingerprint: &str, qdata: &Value) -> Option<Request> {
        let qdata = match qdata {
            Value::Null => None,
            Value::Object(qdata) => Some(qdata),
            other => {
                log::warn!("Dropped {fingerprint}, unexpected queue data: {other}");
                return None;
            }
        };
        let url = qdata
            .and_then(|qdata| qdata.get("url"))
            .and_then(Value::as_str)
            .unwrap_or(fingerprint);
        let mut request = Request::new(url);

        let data = match qdata.and_then(|qdata| qdata.get("request")) {
            None | Some(Value::Null) => return Some(request),
            Some(Value::Object(data)) => data,
            Some(other) => {
                log::warn!("Dropped {fingerprint}, unexpected request data: {other}");
                return None;
            }
        };
        if let Some(method) = data.get("method").and_then(Value::as_str) {
            request.method = method.to_string();
        }
        if let Some(headers) = data.get("headers").and_then(Value::as_object) {
            request.headers = to_string_map(headers);
        }
        if let Some(cookies) = data.get("cookies").and_then(Value::as_object) {
            request.cookies = to_string_map(cookies);
        }
        if let Some(meta) = data.get("meta").and_then(Value::as_object) {
            request.meta = meta.clone();
        }
        Some(request)
    }
}

fn to_string_map(values: &Meta) -> StringMap {
    values
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(value) => value.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
