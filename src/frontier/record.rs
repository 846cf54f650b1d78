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

use crate::request::{meta_keys, Request};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The id the frontier assigned to a batch.
pub type BatchId = String;

/// A single item of a batch, the fingerprint and the opaque queue data.
pub type QueueItem = (String, Value);

/// A group of items returned by one read. Deleted once consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    #[serde(default)]
    pub requests: Vec<QueueItem>,
}

impl Batch {
    pub fn new(id: impl Into<BatchId>, requests: Vec<QueueItem>) -> Self {
        Self {
            id: id.into(),
            requests,
        }
    }
}

/// A single record written to the frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierRecord {
    pub fp: String,
    #[serde(default)]
    pub qdata: Value,
}

impl FrontierRecord {
    pub fn new(fp: impl Into<String>, qdata: Value) -> Self {
        Self { fp: fp.into(), qdata }
    }

    /// Converts a link into its frontier record:
    /// `{"fp": url, "qdata": {"request": {method, headers, cookies, meta}}}`.
    ///
    /// The url is used as fingerprint of the record, the internal frontier marker is dropped.
    pub fn from_request(mut request: Request) -> Self {
        request.meta.remove(meta_keys::ORIGIN_IS_FRONTIER);
        let Request {
            url,
            method,
            headers,
            cookies,
            meta,
        } = request;

        fn to_object(values: impl IntoIterator<Item = (String, String)>) -> Value {
            Value::Object(
                values
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            )
        }

        let mut data = Map::with_capacity(4);
        data.insert("method".to_string(), Value::String(method));
        data.insert("headers".to_string(), to_object(headers));
        data.insert("cookies".to_string(), to_object(cookies));
        data.insert("meta".to_string(), Value::Object(meta));

        let mut qdata = Map::with_capacity(1);
        qdata.insert("request".to_string(), Value::Object(data));

        Self {
            fp: url,
            qdata: Value::Object(qdata),
        }
    }
}

impl From<Request> for FrontierRecord {
    fn from(value: Request) -> Self {
        Self::from_request(value)
    }
}
