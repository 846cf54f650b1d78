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

use crate::request::Request;
use thiserror::Error;

/// Errors of a disk queue
#[derive(Debug, Error)]
pub enum DiskQueueError {
    #[error(transparent)]
    QueueFileError(#[from] queue_file::Error),
    #[error(transparent)]
    EncodingError(#[from] serde_json::Error),
    #[error("The encoded request has {size} bytes but only {limit} bytes are allowed.")]
    ElementTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("The disk queue is closed.")]
    Closed,
}

impl DiskQueueError {
    /// Returns true if the error was caused by the request itself and not by the storage.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::EncodingError(_) | Self::ElementTooLarge { .. })
    }
}

/// A push that failed. Hands the request back to the caller.
#[derive(Debug, Error)]
#[error("Failed to push {request} to the disk queue: {cause}")]
pub struct RejectedRequest {
    pub request: Request,
    #[source]
    pub cause: DiskQueueError,
}

impl RejectedRequest {
    pub fn new(request: Request, cause: impl Into<DiskQueueError>) -> Self {
        Self {
            request,
            cause: cause.into(),
        }
    }

    pub fn is_serialization(&self) -> bool {
        self.cause.is_serialization()
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}
