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

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://storage.scrapinghub.com/";
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings of the hubstorage frontier.
///
/// `auth` and `project_id` fall back to `SH_APIKEY` and `SHUB_JOBKEY` when running in a
/// scrapinghub job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename(serialize = "Hubstorage"))]
pub struct HubstorageConfig {
    #[serde(default = "_default_endpoint")]
    pub endpoint: Url,
    /// The api key
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Written links are uploaded in chunks of this size.
    #[serde(default = "_default_upload_chunk_size")]
    pub upload_chunk_size: usize,
    /// Request timeout in seconds.
    #[serde(default = "_default_timeout_secs")]
    pub timeout_secs: u64,
}

fn _default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("The default endpoint is a valid url.")
}
const fn _default_upload_chunk_size() -> usize {
    DEFAULT_UPLOAD_CHUNK_SIZE
}
const fn _default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for HubstorageConfig {
    fn default() -> Self {
        Self {
            endpoint: _default_endpoint(),
            auth: None,
            project_id: None,
            upload_chunk_size: _default_upload_chunk_size(),
            timeout_secs: _default_timeout_secs(),
        }
    }
}
