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

//! The hybrid queue router. Crawled links go to the frontier or to the local
//! memory and disk queues, requests are served from memory, disk and finally the frontier.

mod errors;
mod router;
mod throttle;

pub use errors::BackendError;
pub use router::{HcfBackend, PageCrawled};
pub use throttle::{PollThrottle, DEFAULT_POLL_DELAY};
