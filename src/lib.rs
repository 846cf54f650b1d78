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

//! A frontier backend for crawl processes sharing their work through the hubstorage
//! crawl frontier. Links are spread over the slots of a frontier by a producer and
//! read back by consumers, with a memory and a disk queue for the local work.

pub mod app;
pub mod backend;
pub mod config;
pub mod frontier;
pub mod queue;
pub mod request;
pub mod runtime;
pub mod slots;
pub mod stats;
pub mod strategies;

#[cfg(test)]
mod test_impls;
