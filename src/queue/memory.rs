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
use std::collections::VecDeque;

/// The in process tier of the backend. A plain FIFO without a capacity of its own,
/// the backend decides how much goes in here.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queue: VecDeque<Request>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: Request) {
        log::trace!("Memory queue push {request}");
        self.queue.push_back(request)
    }

    pub fn pop(&mut self) -> Option<Request> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Extend<Request> for MemoryQueue {
    fn extend<T: IntoIterator<Item = Request>>(&mut self, iter: T) {
        self.queue.extend(iter)
    }
}

#[cfg(test)]
mod test {
    use crate::queue::MemoryQueue;
    use crate::request::Request;

    #[test]
    fn is_fifo() {
        let mut queue = MemoryQueue::new();
        assert!(queue.is_empty());
        queue.push(Request::new("https://www.test1.de/"));
        queue.extend([
            Request::new("https://www.test2.de/"),
            Request::new("https://www.test3.de/"),
        ]);
        assert_eq!(3, queue.len());
        assert_eq!("https://www.test1.de/", queue.pop().unwrap().url);
        assert_eq!("https://www.test2.de/", queue.pop().unwrap().url);
        assert_eq!("https://www.test3.de/", queue.pop().unwrap().url);
        assert_eq!(None, queue.pop());
    }
}
