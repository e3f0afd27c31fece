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

//! Mergeable fixed-bin linear histogram.
//!
//! P² marker state cannot be merged across independent streams, so shard
//! workers additionally feed a [`MergingHistogram`] per series: bin counts
//! add under range union, trading resolution (the bin count) for
//! mergeability. Values outside the current range trigger a rebin that
//! remaps each old bin's center into the expanded layout; lossy, but cheap.
//!
//! # Usage
//!
//! ```rust
//! use bundlestats::histogram::MergingHistogram;
//!
//! let mut left = MergingHistogram::new(64);
//! let mut right = MergingHistogram::new(64);
//! for i in 0..500 {
//!     left.push(i as f64, 1.0);
//!     right.push((500 + i) as f64, 1.0);
//! }
//! left.merge(&right);
//!
//! let values = left.values(&[0.5]).unwrap();
//! assert!((values[0] - 500.0).abs() < 50.0);
//! ```

mod sketch;
pub use self::sketch::MergingHistogram;
