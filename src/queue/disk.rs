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

use crate::queue::errors::{DiskQueueError, RejectedRequest};
use crate::request::Request;
use camino::{Utf8Path, Utf8PathBuf};
use queue_file::QueueFile;

/// The default upper bound for a single encoded request (1 MiB).
pub const DEFAULT_MAX_ELEMENT_SIZE: usize = 1024 * 1024;

/// The overflow tier of the backend. Holds requests outside of the process memory.
pub trait DiskQueue {
    /// Pushes a request. A failed push hands the request back.
    fn push(&mut self, request: Request) -> Result<(), RejectedRequest>;

    /// Pops the oldest request.
    fn pop(&mut self) -> Result<Option<Request>, DiskQueueError>;

    /// Returns the number of queued requests.
    fn len(&self) -> usize;

    /// Returns true if the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases the underlying storage. Calling it twice is fine.
    fn close(&mut self) -> Result<(), DiskQueueError>;
}

/// A [DiskQueue] backed by a queue file. Requests are stored as json.
#[derive(Debug)]
pub struct FileDiskQueue {
    path: Utf8PathBuf,
    max_element_size: usize,
    queue: Option<QueueFile>,
}

impl FileDiskQueue {
    pub fn open<P: AsRef<Utf8Path>>(path: P, max_element_size: usize) -> Result<Self, DiskQueueError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let queue = QueueFile::open(path.as_std_path())?;
        log::debug!("Opened disk queue at {path} with {} request(s).", queue.size());
        Ok(Self {
            path,
            max_element_size,
            queue: Some(queue),
        })
    }

    /// Opens a fresh queue file in the temp dir.
    pub fn temporary(max_element_size: usize) -> Result<Self, DiskQueueError> {
        let mut temp_queue_file = std::env::temp_dir();
        temp_queue_file.push(env!("CARGO_PKG_NAME"));
        temp_queue_file.push(env!("CARGO_PKG_VERSION"));
        temp_queue_file.push(uuid::Uuid::new_v4().as_simple().to_string());
        temp_queue_file.push("queue");
        let path = Utf8PathBuf::from_path_buf(temp_queue_file).map_err(|path| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("The temp path {} is not utf8.", path.display()),
            )
        })?;
        Self::open(path, max_element_size)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn encode(&self, request: &Request) -> Result<Vec<u8>, DiskQueueError> {
        let encoded = serde_json::to_vec(request)?;
        if encoded.len() > self.max_element_size {
            return Err(DiskQueueError::ElementTooLarge {
                size: encoded.len(),
                limit: self.max_element_size,
            });
        }
        Ok(encoded)
    }
}

impl DiskQueue for FileDiskQueue {
    fn push(&mut self, request: Request) -> Result<(), RejectedRequest> {
        let encoded = match self.encode(&request) {
            Ok(encoded) => encoded,
            Err(err) => return Err(RejectedRequest::new(request, err)),
        };
        let Some(queue) = self.queue.as_mut() else {
            return Err(RejectedRequest::new(request, DiskQueueError::Closed));
        };
        log::trace!("Disk queue push {request}");
        match queue.add(&encoded) {
            Ok(()) => Ok(()),
            Err(err) => Err(RejectedRequest::new(request, err)),
        }
    }

    fn pop(&mut self) -> Result<Option<Request>, DiskQueueError> {
        let queue = self.queue.as_mut().ok_or(DiskQueueError::Closed)?;
        let extracted = queue.peek()?;
        if let Some(extracted) = extracted {
            queue.remove()?;
            let value: Request = serde_json::from_slice(extracted.as_ref())?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.size())
    }

    fn close(&mut self) -> Result<(), DiskQueueError> {
        if let Some(queue) = self.queue.take() {
            log::debug!(
                "Closing disk queue at {} with {} request(s) left.",
                self.path,
                queue.size()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::queue::{DiskQueue, DiskQueueError, FileDiskQueue, DEFAULT_MAX_ELEMENT_SIZE};
    use crate::request::Request;
    use camino_tempfile::tempdir;
    use scopeguard::defer;

    #[test]
    fn can_push_and_pop_in_order() {
        let dir = tempdir().unwrap();
        let mut queue = FileDiskQueue::open(dir.path().join("queue"), DEFAULT_MAX_ELEMENT_SIZE).unwrap();
        assert!(queue.is_empty());
        queue
            .push(Request::new("https://www.test1.de/").with_fingerprint("a1"))
            .unwrap();
        queue.push(Request::new("https://www.test2.de/")).unwrap();
        assert_eq!(2, queue.len());
        let first = queue.pop().unwrap().unwrap();
        assert_eq!("https://www.test1.de/", first.url);
        assert_eq!(Some("a1"), first.fingerprint());
        assert_eq!("https://www.test2.de/", queue.pop().unwrap().unwrap().url);
        assert!(queue.pop().unwrap().is_none());
    }

    #[test]
    fn survives_a_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("queue");
        let mut queue = FileDiskQueue::open(&path, DEFAULT_MAX_ELEMENT_SIZE).unwrap();
        queue.push(Request::new("https://www.test1.de/")).unwrap();
        queue.close().unwrap();
        drop(queue);

        let mut queue = FileDiskQueue::open(&path, DEFAULT_MAX_ELEMENT_SIZE).unwrap();
        assert_eq!(1, queue.len());
        assert_eq!("https://www.test1.de/", queue.pop().unwrap().unwrap().url);
    }

    #[test]
    fn oversized_requests_are_handed_back() {
        let dir = tempdir().unwrap();
        let mut queue = FileDiskQueue::open(dir.path().join("queue"), 64).unwrap();
        let request = Request::new("https://www.test1.de/").with_meta("blob", "x".repeat(128));
        let rejected = queue.push(request.clone()).unwrap_err();
        assert!(rejected.is_serialization());
        assert!(matches!(
            rejected.cause,
            DiskQueueError::ElementTooLarge { limit: 64, .. }
        ));
        assert_eq!(request, rejected.into_request());
        assert!(queue.is_empty());
    }

    #[test]
    fn closed_queue_rejects_without_serialization_error() {
        let dir = tempdir().unwrap();
        let mut queue = FileDiskQueue::open(dir.path().join("queue"), DEFAULT_MAX_ELEMENT_SIZE).unwrap();
        queue.close().unwrap();
        queue.close().unwrap();
        let rejected = queue.push(Request::new("https://www.test1.de/")).unwrap_err();
        assert!(!rejected.is_serialization());
        assert!(matches!(queue.pop(), Err(DiskQueueError::Closed)));
    }

    #[test]
    fn temporary_queues_are_unique() {
        let mut first = FileDiskQueue::temporary(DEFAULT_MAX_ELEMENT_SIZE).unwrap();
        let second = FileDiskQueue::temporary(DEFAULT_MAX_ELEMENT_SIZE).unwrap();
        let first_dir = first.path().parent().unwrap().to_path_buf();
        let second_dir = second.path().parent().unwrap().to_path_buf();
        defer! {
            let _ = std::fs::remove_dir_all(&first_dir);
            let _ = std::fs::remove_dir_all(&second_dir);
        }
        assert_ne!(first.path(), second.path());
        first.push(Request::new("https://www.test1.de/")).unwrap();
        assert_eq!(1, first.len());
        assert!(second.is_empty());
    }
}
