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

/// The default number of attempts for reads and deletes.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// The default base delay of the linear backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);

/// Linear retry policy for frontier reads and deletes.
///
/// After the failed attempt `i` (1-based) the manager waits `base_delay * i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// The wait after the failed `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// The sum of all waits if every attempt fails.
    pub fn worst_case(&self) -> Duration {
        (1..=self.max_attempts)
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

#[cfg(test)]
mod test {
    use crate::frontier::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(Duration::from_secs(60), policy.delay_after(1));
        assert_eq!(Duration::from_secs(120), policy.delay_after(2));
        assert_eq!(Duration::from_secs(600), policy.delay_after(10));
        assert_eq!(Duration::from_secs(3300), policy.worst_case());
    }
}
