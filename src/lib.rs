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

//! Progressive and streaming summary statistics over analytics bundles.
//!
//! bundlestats computes approximate-then-exact totals, quantiles, and
//! categorical Top-K over large, possibly still-arriving datasets of
//! analytics records, without blocking a caller. Sampling tiers are
//! deterministic and nested — a bundle's membership in `[0, 1)` is a pure
//! hash of its identity key — so partial results at a smaller phase are
//! always a subset of results at a larger one, and partial snapshots from
//! parallel shard workers merge order-independently.
//!
//! The building blocks, leaf first:
//!
//! - [`hash`]: deterministic membership hashing.
//! - [`quantile`], [`topk`], [`histogram`]: online estimators.
//! - [`run`]: the progressive (closed-set) and streaming (open-set) run
//!   state machines.
//! - [`shard`]: the orchestrator fanning ingestion out over shard workers
//!   and merging their partial snapshots.
//! - [`dispatch`]: the request/response command protocol with partial
//!   responses and cooperative cancellation.
//!
//! # Usage
//!
//! ```rust
//! use bundlestats::bundle::Bundle;
//! use bundlestats::cancel::CancelToken;
//! use bundlestats::config::EngineConfig;
//! use bundlestats::extract::ExtractorRegistry;
//! use bundlestats::run::ProgressiveRun;
//!
//! let config = EngineConfig {
//!     thresholds: vec![0.25, 1.0],
//!     series: vec!["lcp".to_string()],
//!     facets: vec!["device".to_string()],
//!     quantiles: vec![0.5],
//!     ..EngineConfig::default()
//! };
//! let registry = ExtractorRegistry::new();
//! let bundles: Vec<Bundle> = (0..100)
//!     .map(|i| {
//!         Bundle::new(format!("b{i}"), 1.0)
//!             .with_field("lcp", 1000.0 + i as f64)
//!             .with_field("device", if i % 3 == 0 { "mobile" } else { "desktop" })
//!     })
//!     .collect();
//!
//! let mut run = ProgressiveRun::new(&bundles, None, &config, &registry).unwrap();
//! let cancel = CancelToken::new();
//! run.advance_to(0.25, &cancel).unwrap();
//! let early = run.snapshot();
//! assert!(!early.exact);
//!
//! run.advance_to(1.0, &cancel).unwrap();
//! let snapshot = run.snapshot();
//! assert!(snapshot.exact);
//! assert_eq!(snapshot.counts.bundles, 100);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bundle;
pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod filter;
pub mod hash;
pub mod histogram;
pub mod quantile;
pub mod run;
pub mod shard;
pub mod snapshot;
pub mod topk;
