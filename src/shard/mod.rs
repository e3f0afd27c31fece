// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Parallel streaming across shard workers.
//!
//! The [`Orchestrator`] owns N worker threads, each running one
//! [`StreamingRun`](crate::run::StreamingRun) single-threaded. Incoming
//! chunks are assigned round-robin (load balancing only, not partitioned by
//! key), phase advances are broadcast, and per-shard partial snapshots are
//! merged into one externally consistent [`Snapshot`](crate::snapshot::Snapshot).
//!
//! Merging relies exclusively on order-independent reductions: sums, counts,
//! min/max, histogram bin addition, and facet counter union. P² marker
//! state is never merged.

mod merge;
mod orchestrator;

pub use self::merge::merge_partials;
pub use self::orchestrator::Orchestrator;
