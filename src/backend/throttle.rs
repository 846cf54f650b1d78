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

use std::time::Duration;
use tokio::time::Instant;

/// The minimum time between two frontier reads while local requests are available.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(30);

/// Remembers when the frontier may be polled again.
#[derive(Debug, Clone)]
pub struct PollThrottle {
    delay: Duration,
    not_before: Option<Instant>,
}

impl PollThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            not_before: None,
        }
    }

    /// True if the frontier was never polled or the delay has passed.
    pub fn is_elapsed(&self) -> bool {
        self.not_before
            .map_or(true, |not_before| Instant::now() >= not_before)
    }

    /// Blocks polls for the next `delay`.
    pub fn reset(&mut self) {
        self.not_before = Some(Instant::now() + self.delay);
    }
}

impl Default for PollThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_DELAY)
    }
}

#[cfg(test)]
mod test {
    use crate::backend::PollThrottle;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn opens_after_the_delay() {
        let mut throttle = PollThrottle::default();
        assert!(throttle.is_elapsed());
        throttle.reset();
        assert!(!throttle.is_elapsed());
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!throttle.is_elapsed());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(throttle.is_elapsed());
    }
}
