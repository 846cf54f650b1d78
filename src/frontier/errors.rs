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

use thiserror::Error;

/// A type erased error of a frontier service.
pub type BoxedServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors of the frontier manager.
#[derive(Debug, Error)]
pub enum FrontierError {
    /// A permanent error of the service.
    #[error("Failed to {action} {location}: {source}")]
    Service {
        action: &'static str,
        location: String,
        #[source]
        source: BoxedServiceError,
    },
    #[error("Gave up to {action} {location} after {attempts} attempt(s).")]
    Exhausted {
        action: &'static str,
        location: String,
        attempts: u32,
    },
    #[error("Stopped to {action} {location} due to shutdown.")]
    Cancelled {
        action: &'static str,
        location: String,
    },
}

impl FrontierError {
    pub fn service<E>(action: &'static str, location: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Service {
            action,
            location: location.into(),
            source: Box::new(source),
        }
    }
}

/// Errors of the hubstorage client.
#[derive(Debug, Error)]
pub enum HubstorageError {
    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("The endpoint {0} can not be used as base url.")]
    InvalidEndpoint(url::Url),
    #[error("Failed to decode line {line} of the frontier response: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Encode(serde_json::Error),
    #[error("No api key found. Set hubstorage.auth or SH_APIKEY.")]
    MissingAuth,
    #[error("No project id found. Set hubstorage.project_id or SHUB_JOBKEY.")]
    MissingProject,
}
